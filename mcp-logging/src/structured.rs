//! Structured request logging
//!
//! [`StructuredLogger`] is handed to the dispatcher and the connection
//! registry at construction. It emits `tracing` events with a fixed set of
//! fields so request lifecycles can be followed by correlation id.

use crate::sanitization::LogSanitizer;
use serde_json::Value;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-request logging context
#[derive(Debug, Clone)]
pub struct StructuredContext {
    /// Correlation id attached to errors returned for this request
    pub correlation_id: String,
    /// JSON-RPC id of the request, rendered
    pub request_id: Option<String>,
    /// JSON-RPC method
    pub method: String,
    /// Tool being invoked, for `tools/call`
    pub tool_name: Option<String>,

    pub start_time: Instant,
    pub start_timestamp: u64,
}

impl StructuredContext {
    pub fn new(method: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            correlation_id: generate_correlation_id(),
            request_id: None,
            method: method.into(),
            tool_name: None,
            start_time: Instant::now(),
            start_timestamp: timestamp,
        }
    }

    pub fn with_request_id(mut self, request_id: &Value) -> Self {
        self.request_id = match request_id {
            Value::Null => None,
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        };
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Error classification for better observability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller mistakes, never worth retrying
    Client { error_type: String, retryable: bool },
    /// Server-side failures
    Server { error_type: String, retryable: bool },
    /// Upstream connectivity problems
    Network { error_type: String, timeout: bool },
}

impl ErrorClass {
    /// Classify an error using the ErrorClassification trait
    pub fn from_error<E: crate::ErrorClassification + ?Sized>(error: &E) -> Self {
        if error.is_connection_error() || error.is_timeout() {
            Self::Network {
                error_type: error.error_type().to_string(),
                timeout: error.is_timeout(),
            }
        } else if error.is_retryable() {
            Self::Server {
                error_type: error.error_type().to_string(),
                retryable: true,
            }
        } else {
            Self::Client {
                error_type: error.error_type().to_string(),
                retryable: false,
            }
        }
    }
}

/// Structured logger injected into the dispatcher and transport
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    component: String,
    sanitizer: LogSanitizer,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self::with_sanitizer(component, LogSanitizer::new())
    }

    pub fn with_sanitizer(component: impl Into<String>, sanitizer: LogSanitizer) -> Self {
        Self {
            component: component.into(),
            sanitizer,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn sanitizer(&self) -> &LogSanitizer {
        &self.sanitizer
    }

    /// Log request start with sanitized parameters
    pub fn log_request_start(&self, ctx: &StructuredContext, params: &Value) {
        let sanitized_params = self.sanitizer.sanitize_value(params);

        debug!(
            component = %self.component,
            correlation_id = %ctx.correlation_id,
            request_id = ?ctx.request_id,
            method = %ctx.method,
            tool_name = ?ctx.tool_name,
            start_timestamp = ctx.start_timestamp,
            params = %sanitized_params,
            "MCP request started"
        );
    }

    /// Log request completion, with classification when it failed
    pub fn log_request_end<E: crate::ErrorClassification + ?Sized>(
        &self,
        ctx: &StructuredContext,
        error: Option<&E>,
    ) {
        let duration_ms = ctx.elapsed_ms();

        match error {
            None => {
                info!(
                    component = %self.component,
                    correlation_id = %ctx.correlation_id,
                    request_id = ?ctx.request_id,
                    method = %ctx.method,
                    tool_name = ?ctx.tool_name,
                    duration_ms = duration_ms,
                    "MCP request completed successfully"
                );
            }
            Some(error) => {
                let error_class = ErrorClass::from_error(error);
                warn!(
                    component = %self.component,
                    correlation_id = %ctx.correlation_id,
                    request_id = ?ctx.request_id,
                    method = %ctx.method,
                    tool_name = ?ctx.tool_name,
                    duration_ms = duration_ms,
                    error_class = ?error_class,
                    error_message = %self.sanitizer.sanitize(&error.to_string()),
                    "MCP request failed"
                );
            }
        }
    }

    /// Span wrapping handler calls made for one connection, so request logs
    /// emitted inside it carry the connection id
    pub fn connection_span(connection_id: &str) -> tracing::Span {
        tracing::info_span!("mcp_connection", connection_id = %connection_id)
    }

    /// Log a connection lifecycle transition
    pub fn log_connection_event(&self, connection_id: &str, event: &str, detail: Option<&str>) {
        info!(
            component = %self.component,
            connection_id = %connection_id,
            event = %event,
            detail = ?detail.map(|d| self.sanitizer.sanitize(d)),
            "Connection lifecycle event"
        );
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("beacon-mcp")
    }
}

/// Generate a correlation id for request tracing
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}
