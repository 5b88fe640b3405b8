//! Registry of live connections

use crate::config::SseConfig;
use crate::connection::{Admission, Connection, ConnectionState};
use crate::event::{InitializationError, StreamEvent};
use crate::queue::QueueError;
use crate::sequencer::InitializationSequencer;
use crate::{SharedHandler, TransportError};
use beacon_mcp_logging::{generate_correlation_id, StructuredLogger};
use beacon_mcp_protocol::{DefaultErrorClassifier, Error, ErrorClassifier, Request, Response};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

/// Why a submission was refused
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SubmitError {
    #[error("Connection not found: {0}")]
    UnknownConnection(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

/// Owns every live [`Connection`], keyed by id
///
/// The capacity check and the insert happen in one critical section, as does
/// removal, so the connection count never exceeds `max_connections`.
pub struct ConnectionRegistry {
    config: SseConfig,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    handler: Option<SharedHandler>,
    classifier: Arc<dyn ErrorClassifier>,
    logger: Arc<StructuredLogger>,
}

impl ConnectionRegistry {
    pub fn new(config: SseConfig) -> Self {
        Self {
            config,
            connections: RwLock::new(HashMap::new()),
            handler: None,
            classifier: Arc::new(DefaultErrorClassifier::new()),
            logger: Arc::new(StructuredLogger::new("sse-transport")),
        }
    }

    pub fn with_handler(mut self, handler: SharedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_logger(mut self, logger: Arc<StructuredLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &SseConfig {
        &self.config
    }

    pub fn handler(&self) -> Option<&SharedHandler> {
        self.handler.as_ref()
    }

    pub fn classifier(&self) -> &Arc<dyn ErrorClassifier> {
        &self.classifier
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Connection>>> {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Connection>>> {
        self.connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accept a new stream.
    ///
    /// Emits the `connection` event, starts the heartbeat and either starts
    /// the handshake or marks the connection ready right away.
    ///
    /// # Errors
    ///
    /// `TransportError::CapacityReached` when `max_connections` streams are
    /// already open. Existing connections are not affected.
    pub fn open(
        self: &Arc<Self>,
    ) -> Result<(Arc<Connection>, mpsc::UnboundedReceiver<StreamEvent>), TransportError> {
        let id = Uuid::new_v4().to_string();
        let (connection, events) = Connection::new(id.clone());
        let connection = Arc::new(connection);

        connection.send(StreamEvent::Connection {
            connection_id: id.clone(),
            correlation_id: connection.correlation_id().to_string(),
        });

        {
            let mut connections = self.write();
            if connections.len() >= self.config.max_connections {
                warn!(
                    active = connections.len(),
                    max = self.config.max_connections,
                    "Rejecting stream: connection limit reached"
                );
                return Err(TransportError::CapacityReached(connections.len()));
            }
            connections.insert(id.clone(), Arc::clone(&connection));
        }

        self.logger
            .log_connection_event(&id, "opened", Some(connection.correlation_id()));

        connection.set_heartbeat(self.spawn_heartbeat(&connection));

        if self.config.auto_initialize {
            InitializationSequencer::new(Arc::clone(self)).start(Arc::clone(&connection));
        } else {
            connection.mark_ready();
        }

        Ok((connection, events))
    }

    fn spawn_heartbeat(&self, connection: &Arc<Connection>) -> JoinHandle<()> {
        let period = self.config.heartbeat_interval();
        let connection = Arc::downgrade(connection);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(connection) = connection.upgrade() else {
                    break;
                };
                if !connection.send(StreamEvent::heartbeat()) {
                    break;
                }
            }
        })
    }

    /// Submit a client request to a connection.
    ///
    /// Returns whether the request was queued behind the handshake. The
    /// response, if any, is delivered later as an `mcp-response` event.
    pub fn submit(self: &Arc<Self>, connection_id: &str, request: Request) -> Result<bool, SubmitError> {
        let connection = self
            .get(connection_id)
            .ok_or_else(|| SubmitError::UnknownConnection(connection_id.to_string()))?;

        let admission = connection.submit(request).map_err(|error| match error {
            QueueError::ConnectionClosed | QueueError::Sealed => {
                SubmitError::ConnectionClosed(connection_id.to_string())
            }
        })?;

        match admission {
            Admission::Queued(completion) => {
                tokio::spawn(async move {
                    match completion.await {
                        Ok(Ok(Some(response))) => {
                            connection.send(StreamEvent::McpResponse(response));
                        }
                        Ok(Ok(None)) => {}
                        Ok(Err(error)) => debug!(
                            connection_id = %connection.id(),
                            error = %error,
                            "Queued request rejected"
                        ),
                        Err(_) => debug!(
                            connection_id = %connection.id(),
                            "Queued request dropped without completion"
                        ),
                    }
                });
                Ok(true)
            }
            Admission::Immediate(request) => {
                let registry = Arc::clone(self);
                tokio::spawn(async move {
                    if let Some(response) = registry.dispatch(&connection, request).await {
                        connection.send(StreamEvent::McpResponse(response));
                    }
                });
                Ok(false)
            }
        }
    }

    /// Run one request through the handler.
    ///
    /// Handler failures are classified into a JSON-RPC error envelope for the
    /// request's id. A panicking handler is answered with an internal error.
    /// Notifications never produce a response.
    pub async fn dispatch(&self, connection: &Connection, request: Request) -> Option<Response> {
        let id = request.id.clone();

        let Some(handler) = &self.handler else {
            return id.map(|id| {
                Response::error(id, Error::internal_error("No request handler configured"))
            });
        };

        let span = StructuredLogger::connection_span(connection.id());
        let outcome = AssertUnwindSafe(handler.handle(request).instrument(span))
            .catch_unwind()
            .await;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                warn!(connection_id = %connection.id(), panic = %detail, "Request handler panicked");
                return id.map(|id| {
                    Response::error(id, Error::internal_error(format!("Handler panicked: {detail}")))
                });
            }
        };

        match outcome {
            Ok(response) => response,
            Err(error) => {
                let info = self
                    .classifier
                    .classify(&error)
                    .with_correlation_id(generate_correlation_id());
                warn!(
                    connection_id = %connection.id(),
                    correlation_id = ?info.correlation_id,
                    category = %info.category,
                    error = %self.logger.sanitizer().sanitize(&info.message),
                    "Request handler failed"
                );
                id.map(|id| Response::error(id, info.into_error()))
            }
        }
    }

    /// Report a handshake failure and drop the connection, unless it already
    /// left the initializing state.
    pub fn fail_initialization(
        &self,
        connection: &Connection,
        error: InitializationError,
        response: Option<Response>,
    ) -> bool {
        let detail = error.to_string();
        if !connection.abort_initialization(error, response) {
            return false;
        }

        self.remove(connection.id());
        warn!(connection_id = %connection.id(), error = %detail, "Initialization failed");
        self.logger
            .log_connection_event(connection.id(), "initialization_failed", Some(&detail));
        true
    }

    fn remove(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.write().remove(connection_id)
    }

    /// Close and remove one connection. Returns `false` for unknown ids.
    pub fn close(&self, connection_id: &str, reason: &str) -> bool {
        let Some(connection) = self.remove(connection_id) else {
            return false;
        };
        connection.close();
        self.logger
            .log_connection_event(connection_id, "closed", Some(reason));
        true
    }

    /// Close every connection, returning how many were open
    pub fn close_all(&self, reason: &str) -> usize {
        let drained: Vec<Arc<Connection>> = self.write().drain().map(|(_, c)| c).collect();
        for connection in &drained {
            connection.close();
            self.logger
                .log_connection_event(connection.id(), "closed", Some(reason));
        }
        drained.len()
    }

    /// Close connections idle for at least `max_idle`, returning the count
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<String> = self
            .read()
            .values()
            .filter(|connection| connection.idle_for() >= max_idle)
            .map(|connection| connection.id().to_string())
            .collect();

        stale
            .iter()
            .filter(|id| self.close(id, "idle_timeout"))
            .count()
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.read().get(connection_id).cloned()
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.read().contains_key(connection_id)
    }

    pub fn state_of(&self, connection_id: &str) -> Option<ConnectionState> {
        self.get(connection_id).map(|connection| connection.state())
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("config", &self.config)
            .field("connections", &self.len())
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}
