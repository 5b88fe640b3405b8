//! Core Model Context Protocol types and error taxonomy
//!
//! This crate provides the JSON-RPC envelopes, the MCP model types used by the
//! handshake and the tool methods, and the error taxonomy shared by the
//! dispatcher and the SSE transport.
//!
//! # Quick Start
//!
//! ```rust
//! use beacon_mcp_protocol::{CallToolResult, ProtocolMessage, Request};
//! use serde_json::json;
//!
//! let message = ProtocolMessage::from_value(json!({
//!     "jsonrpc": "2.0",
//!     "id": 7,
//!     "method": "tools/list"
//! }))
//! .unwrap();
//! assert!(matches!(message, ProtocolMessage::Request(_)));
//!
//! let request = Request::notification("notifications/initialized", json!({}));
//! assert!(request.is_notification());
//!
//! let result = CallToolResult::text("22°C, sunny");
//! assert!(!result.is_error);
//! ```

pub mod classify;
pub mod error;
pub mod message;
pub mod model;

#[cfg(test)]
mod classify_tests;
#[cfg(test)]
mod model_tests;

// Re-export core types for easy access
pub use classify::{DefaultErrorClassifier, ErrorClassifier};
pub use error::{Error, ErrorCategory, ErrorCode, ErrorInfo, McpResult, Result};
pub use message::{extract_id, ProtocolMessage};
pub use model::*;

/// Protocol version the server always answers with
pub const MCP_VERSION: &str = "2024-11-05";
