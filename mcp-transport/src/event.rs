//! Named events pushed over a connection's SSE stream

use axum::response::sse::Event;
use beacon_mcp_protocol::{ErrorCode, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// One outbound event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Always the first event on a stream
    Connection {
        connection_id: String,
        correlation_id: String,
    },
    /// A JSON-RPC response or error envelope
    McpResponse(Response),
    /// Liveness signal, milliseconds since the epoch
    Heartbeat { timestamp: i64 },
    /// Fatal handshake failure, sent right before the stream closes
    InitializationError(InitializationError),
}

impl StreamEvent {
    pub const CONNECTION: &'static str = "connection";
    pub const MCP_RESPONSE: &'static str = "mcp-response";
    pub const HEARTBEAT: &'static str = "heartbeat";
    pub const INITIALIZATION_ERROR: &'static str = "initialization_error";

    pub fn heartbeat() -> Self {
        StreamEvent::Heartbeat {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connection { .. } => Self::CONNECTION,
            StreamEvent::McpResponse(_) => Self::MCP_RESPONSE,
            StreamEvent::Heartbeat { .. } => Self::HEARTBEAT,
            StreamEvent::InitializationError(_) => Self::INITIALIZATION_ERROR,
        }
    }

    /// JSON body of the event
    pub fn payload(&self) -> Value {
        match self {
            StreamEvent::Connection {
                connection_id,
                correlation_id,
            } => json!({
                "connectionId": connection_id,
                "correlationId": correlation_id,
            }),
            StreamEvent::McpResponse(response) => {
                serde_json::to_value(response).unwrap_or_else(|_| {
                    json!({"jsonrpc": "2.0", "id": response.id, "error": {
                        "code": ErrorCode::InternalError.as_i32(),
                        "message": "Failed to serialize response",
                    }})
                })
            }
            StreamEvent::Heartbeat { timestamp } => json!({ "timestamp": timestamp }),
            StreamEvent::InitializationError(error) => error.payload(),
        }
    }

    /// Render as an SSE event carrying the given stream-local id
    pub fn to_sse(&self, id: u64) -> Event {
        Event::default()
            .id(id.to_string())
            .event(self.name())
            .data(self.payload().to_string())
    }
}

/// Why a handshake failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationErrorKind {
    /// No request handler configured
    HandlerUnavailable,
    /// The handler call failed
    RequestProcessing,
    /// The handler returned nothing, or a result without the handshake fields
    ResponseValidation,
    /// The handler answered the handshake with a protocol error
    ProtocolError,
    /// The handler did not answer within the initialization timeout
    InitializationTimeout,
}

impl InitializationErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HandlerUnavailable => "handler_unavailable",
            Self::RequestProcessing => "request_processing",
            Self::ResponseValidation => "response_validation",
            Self::ProtocolError => "protocol_error",
            Self::InitializationTimeout => "initialization_timeout",
        }
    }
}

impl fmt::Display for InitializationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an `initialization_error` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} ({code}): {message}")]
pub struct InitializationError {
    #[serde(rename = "type")]
    pub kind: InitializationErrorKind,
    pub code: i32,
    pub message: String,
}

impl InitializationError {
    pub fn new(kind: InitializationErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.as_i32(),
            message: message.into(),
        }
    }

    pub fn handler_unavailable() -> Self {
        Self::new(
            InitializationErrorKind::HandlerUnavailable,
            ErrorCode::InternalError,
            "No request handler configured",
        )
    }

    pub fn response_validation(message: impl Into<String>) -> Self {
        Self::new(
            InitializationErrorKind::ResponseValidation,
            ErrorCode::InternalError,
            message,
        )
    }

    pub fn timeout(after_ms: u64) -> Self {
        Self::new(
            InitializationErrorKind::InitializationTimeout,
            ErrorCode::UpstreamUnavailable,
            format!("Initialization did not complete within {after_ms}ms"),
        )
    }

    pub fn payload(&self) -> Value {
        json!({
            "type": self.kind,
            "code": self.code,
            "message": self.message,
        })
    }
}
