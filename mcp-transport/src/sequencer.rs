//! Automatic `initialize` handshake
//!
//! The sequencer submits one synthetic `initialize` request per connection on
//! the client's behalf, moves the connection to `Ready` on a well-formed
//! answer and then flushes the requests queued in the meantime, in submission
//! order. Any failure is fatal to the connection and reported once through an
//! `initialization_error` event.

use crate::connection::Connection;
use crate::event::{InitializationError, InitializationErrorKind};
use crate::queue::{PendingRequest, QueueError};
use crate::registry::{panic_message, ConnectionRegistry};
use beacon_mcp_logging::StructuredLogger;
use beacon_mcp_protocol::{
    ErrorCode, Implementation, InitializeRequestParam, InitializeResult, Request, Response,
    MCP_VERSION,
};
use futures::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

/// Prefix of synthetic handshake ids, keeping them apart from client ids
pub const HANDSHAKE_ID_PREFIX: &str = "beacon-init-";

/// Client identity used for the synthetic handshake
pub const HANDSHAKE_CLIENT_NAME: &str = "beacon-sse-transport";

/// Why a handshake failed, plus the handler's error response when there was one
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeFailure {
    pub error: InitializationError,
    pub response: Option<Response>,
}

impl From<InitializationError> for HandshakeFailure {
    fn from(error: InitializationError) -> Self {
        Self {
            error,
            response: None,
        }
    }
}

/// Drives one connection from `Initializing` to `Ready`
#[derive(Clone)]
pub struct InitializationSequencer {
    registry: Arc<ConnectionRegistry>,
}

impl InitializationSequencer {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The synthetic `initialize` request sent on the client's behalf
    pub fn handshake_request() -> Request {
        let params = InitializeRequestParam {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: json!({}),
            client_info: Implementation {
                name: HANDSHAKE_CLIENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Request::new(
            format!("{HANDSHAKE_ID_PREFIX}{}", Uuid::new_v4()),
            "initialize",
            serde_json::to_value(params).unwrap_or_else(|_| json!({})),
        )
    }

    pub fn is_handshake_id(id: &Value) -> bool {
        id.as_str()
            .is_some_and(|id| id.starts_with(HANDSHAKE_ID_PREFIX))
    }

    /// Check a handler's answer to the handshake
    pub fn validate_handshake(response: Option<Response>) -> Result<Response, HandshakeFailure> {
        let Some(response) = response else {
            return Err(
                InitializationError::response_validation("Handler returned no response").into(),
            );
        };

        if let Some(error) = &response.error {
            return Err(HandshakeFailure {
                error: InitializationError::new(
                    InitializationErrorKind::ProtocolError,
                    error.code,
                    error.message.clone(),
                ),
                response: Some(response),
            });
        }

        match &response.result {
            None => Err(InitializationError::response_validation(
                "Handshake response carries no result",
            )
            .into()),
            Some(result) if !InitializeResult::is_well_formed(result) => {
                Err(InitializationError::response_validation(
                    "Handshake result lacks serverInfo and protocolVersion",
                )
                .into())
            }
            Some(_) => Ok(response),
        }
    }

    /// Claim the connection's single handshake attempt and run it in the
    /// background, bounded by the initialization timeout.
    ///
    /// Returns `false` if the handshake was already started or the connection
    /// is past `Connecting`.
    pub fn start(&self, connection: Arc<Connection>) -> bool {
        if !connection.begin_initialization() {
            return false;
        }

        let timeout = self.registry.config().initialization_timeout();
        let timeout_ms = self.registry.config().initialization_timeout_ms;
        let timer = {
            let registry = Arc::clone(&self.registry);
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                registry.fail_initialization(
                    &connection,
                    InitializationError::timeout(timeout_ms),
                    None,
                );
            })
        };
        connection.set_initialization_timer(timer);

        let sequencer = self.clone();
        tokio::spawn(async move { sequencer.run(connection).await });
        true
    }

    async fn run(&self, connection: Arc<Connection>) {
        let request = Self::handshake_request();
        debug!(
            connection_id = %connection.id(),
            request_id = %request.response_id(),
            "Submitting handshake"
        );

        match self.perform(&connection, request).await {
            Ok(response) => match connection.complete_initialization(response) {
                Some(queued) => {
                    info!(
                        connection_id = %connection.id(),
                        queued = queued.len(),
                        "Connection ready"
                    );
                    self.registry
                        .logger()
                        .log_connection_event(connection.id(), "ready", None);
                    self.flush(&connection, queued).await;
                }
                None => debug!(
                    connection_id = %connection.id(),
                    "Discarding handshake response for a connection no longer initializing"
                ),
            },
            Err(failure) => {
                self.registry
                    .fail_initialization(&connection, failure.error, failure.response);
            }
        }
    }

    async fn perform(
        &self,
        connection: &Connection,
        request: Request,
    ) -> Result<Response, HandshakeFailure> {
        let Some(handler) = self.registry.handler() else {
            return Err(InitializationError::handler_unavailable().into());
        };

        let span = StructuredLogger::connection_span(connection.id());
        let handshake = AssertUnwindSafe(handler.handle(request).instrument(span));
        let outcome = match handshake.catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                return Err(InitializationError::new(
                    InitializationErrorKind::RequestProcessing,
                    ErrorCode::InternalError,
                    format!("Handler panicked: {}", panic_message(payload.as_ref())),
                )
                .into());
            }
        };

        match outcome {
            Ok(response) => Self::validate_handshake(response),
            Err(error) => {
                let info = self.registry.classifier().classify(&error);
                Err(InitializationError::new(
                    InitializationErrorKind::RequestProcessing,
                    info.code,
                    info.message,
                )
                .into())
            }
        }
    }

    /// Dispatch queued requests one at a time, in submission order. Every
    /// entry is completed or rejected, including when a handler panics.
    async fn flush(&self, connection: &Connection, queued: Vec<PendingRequest>) {
        let mut queued = queued.into_iter();

        while let Some(pending) = queued.next() {
            if connection.is_closed() {
                pending.reject(QueueError::ConnectionClosed);
                queued.for_each(|rest| rest.reject(QueueError::ConnectionClosed));
                return;
            }

            let response = self
                .registry
                .dispatch(connection, pending.request().clone())
                .await;
            pending.complete(response);
        }
    }
}
