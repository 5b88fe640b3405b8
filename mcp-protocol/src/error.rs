//! Error types for the MCP protocol

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for MCP protocol operations
///
/// Note: Use `McpResult` instead of `Result` to avoid conflicts with std::result::Result
pub type Result<T> = std::result::Result<T, Error>;

/// Preferred result type alias that doesn't conflict with std::result::Result
pub type McpResult<T> = std::result::Result<T, Error>;

/// JSON-RPC error object as carried in a response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub struct Error {
    /// Numeric error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error with additional data
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create a method not found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Method not found: {}", method.into()),
        )
    }

    /// Create an invalid params error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a tool not found error
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ToolNotFound,
            format!("Tool not found: {}", tool.into()),
        )
    }

    /// Create a validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Create a rate limit exceeded error
    pub fn rate_limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimitExceeded, message)
    }

    /// Create an upstream connectivity error
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    /// Category of this error in the classification taxonomy
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Build a protocol error from classified error information.
    ///
    /// The `data` payload carries the category, the retryable flag and the
    /// correlation id so clients can drive their own retry policy.
    pub fn from_info(info: &ErrorInfo) -> Self {
        Self::with_data(info.code, info.message.clone(), info.data())
    }
}

/// MCP error codes following JSON-RPC 2.0 specification
///
/// Serialized as the bare JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ErrorCode {
    // Standard JSON-RPC 2.0 errors
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,

    // Server error range
    ToolNotFound = -32003,
    ValidationError = -32004,
    RateLimitExceeded = -32005,
    UpstreamUnavailable = -32006,
}

impl ErrorCode {
    /// Numeric wire value
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Taxonomy category a code belongs to
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::ParseError
            | ErrorCode::InvalidRequest
            | ErrorCode::InvalidParams
            | ErrorCode::ValidationError => ErrorCategory::Validation,
            ErrorCode::MethodNotFound | ErrorCode::ToolNotFound => ErrorCategory::NotFound,
            ErrorCode::RateLimitExceeded => ErrorCategory::RateLimiting,
            ErrorCode::UpstreamUnavailable => ErrorCategory::Network,
            ErrorCode::InternalError => ErrorCategory::Internal,
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        let code = match value {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            -32003 => ErrorCode::ToolNotFound,
            -32004 => ErrorCode::ValidationError,
            -32005 => ErrorCode::RateLimitExceeded,
            -32006 => ErrorCode::UpstreamUnavailable,
            other => return Err(format!("unknown error code: {other}")),
        };
        Ok(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::ParseError => "ParseError",
            ErrorCode::InvalidRequest => "InvalidRequest",
            ErrorCode::MethodNotFound => "MethodNotFound",
            ErrorCode::InvalidParams => "InvalidParams",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::ToolNotFound => "ToolNotFound",
            ErrorCode::ValidationError => "ValidationError",
            ErrorCode::RateLimitExceeded => "RateLimitExceeded",
            ErrorCode::UpstreamUnavailable => "UpstreamUnavailable",
        };
        write!(f, "{name}")
    }
}

/// Error taxonomy used for client-side retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or missing parameters
    Validation,
    /// Unknown method or tool
    NotFound,
    /// Upstream throttling
    RateLimiting,
    /// Upstream connectivity failure
    Network,
    /// Anything unclassified
    Internal,
}

impl ErrorCategory {
    /// Whether a client may retry a request that failed with this category
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::RateLimiting | ErrorCategory::Network)
    }

    /// Code used when an unclassified error lands in this category
    pub fn default_code(self) -> ErrorCode {
        match self {
            ErrorCategory::Validation => ErrorCode::InvalidParams,
            ErrorCategory::NotFound => ErrorCode::ToolNotFound,
            ErrorCategory::RateLimiting => ErrorCode::RateLimitExceeded,
            ErrorCategory::Network => ErrorCode::UpstreamUnavailable,
            ErrorCategory::Internal => ErrorCode::InternalError,
        }
    }

    /// Wire name of the category
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::RateLimiting => "rate_limiting",
            ErrorCategory::Network => "network",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified error, ready to be reported to a client or a log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{category} error ({code}): {message}")]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ErrorInfo {
    /// Classified error with the category's default code
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            code: category.default_code(),
            message: message.into(),
            retryable: category.is_retryable(),
            correlation_id: None,
        }
    }

    /// Classified error carrying an explicit protocol code
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        let category = code.category();
        Self {
            category,
            code,
            message: message.into(),
            retryable: category.is_retryable(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// The `data` member attached to a JSON-RPC error built from this info
    pub fn data(&self) -> serde_json::Value {
        serde_json::json!({
            "category": self.category,
            "retryable": self.retryable,
            "correlationId": self.correlation_id,
        })
    }

    pub fn into_error(self) -> Error {
        Error::from_info(&self)
    }
}

impl From<ErrorInfo> for Error {
    fn from(info: ErrorInfo) -> Self {
        Error::from_info(&info)
    }
}

// Implement conversion from common error types
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::parse_error(err.to_string())
    }
}

#[cfg(feature = "logging")]
impl beacon_mcp_logging::ErrorClassification for ErrorInfo {
    fn error_type(&self) -> &str {
        self.category.as_str()
    }

    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn is_timeout(&self) -> bool {
        self.category == ErrorCategory::Network && self.message.to_lowercase().contains("timeout")
    }

    fn is_connection_error(&self) -> bool {
        self.category == ErrorCategory::Network
    }
}

#[cfg(feature = "logging")]
impl beacon_mcp_logging::ErrorClassification for Error {
    fn error_type(&self) -> &str {
        match self.code {
            ErrorCode::ParseError => "parse_error",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::MethodNotFound => "method_not_found",
            ErrorCode::InvalidParams => "invalid_params",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::ToolNotFound => "tool_not_found",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            ErrorCode::UpstreamUnavailable => "upstream_unavailable",
        }
    }

    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    fn is_timeout(&self) -> bool {
        false // Protocol errors don't directly represent timeouts
    }

    fn is_connection_error(&self) -> bool {
        self.code == ErrorCode::UpstreamUnavailable
    }
}
