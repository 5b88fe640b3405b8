//! Structured logging for Beacon MCP servers
//!
//! This crate provides:
//! - Tracing subscriber setup (`LoggingConfig`, `init_tracing`)
//! - Request lifecycle logging with correlation ids (`StructuredLogger`)
//! - Credential sanitization for parameters and error messages
//!
//! # Example
//!
//! ```rust,no_run
//! use beacon_mcp_logging::{init_tracing, LoggingConfig, StructuredContext, StructuredLogger};
//!
//! init_tracing(&LoggingConfig::default()).expect("Failed to initialize logging");
//!
//! let logger = StructuredLogger::new("dispatcher");
//! let ctx = StructuredContext::new("tools/call").with_tool("search_apps");
//! logger.log_request_start(&ctx, &serde_json::json!({"apiKey": "hidden"}));
//! ```

pub mod config;
pub mod sanitization;
pub mod structured;

#[cfg(test)]
mod lib_tests;
#[cfg(test)]
mod structured_tests;

// Re-export main types for convenience
pub use config::{init_tracing, LogFormat, LoggingConfig};
pub use sanitization::{LogSanitizer, SanitizationConfig};
pub use structured::{generate_correlation_id, ErrorClass, StructuredContext, StructuredLogger};

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Logging error types
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracing error: {0}")]
    Tracing(String),
}

/// Generic error trait for classification
pub trait ErrorClassification: std::fmt::Display + std::error::Error {
    fn error_type(&self) -> &str;
    fn is_retryable(&self) -> bool;
    fn is_timeout(&self) -> bool;
    fn is_connection_error(&self) -> bool;
}
