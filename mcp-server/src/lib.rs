//! Tool registry, protocol dispatcher and SSE-hosted MCP server
//!
//! Register tools in a [`ToolRegistry`], wrap it in a [`ProtocolDispatcher`]
//! (or let [`McpServer`] do it) and serve it over the SSE transport.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use beacon_mcp_server::{McpServer, ServerConfig, ToolDescriptor, ToolRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ToolRegistry::new());
//!     registry.register(ToolDescriptor::from_fn(
//!         "echo",
//!         "Echo the given text",
//!         json!({"type": "object", "properties": {"text": {"type": "string"}}}),
//!         |arguments| async move { Ok(json!(arguments.get("text").cloned())) },
//!     ))?;
//!
//!     let mut server = McpServer::new(registry, ServerConfig::default())?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod registry;
pub mod server;

#[cfg(test)]
mod dispatcher_tests;

// Re-export core types
pub use dispatcher::{DispatcherConfig, Method, ProtocolDispatcher};
pub use registry::{RegistryError, ToolDescriptor, ToolHandler, ToolRegistry};
pub use server::{HealthStatus, McpServer, ServerConfig, ServerError};

// Re-export from dependencies for convenience
pub use beacon_mcp_logging::{self as logging, StructuredLogger};
pub use beacon_mcp_protocol::{self as protocol, *};
pub use beacon_mcp_transport::{self as transport, RequestHandler, SseConfig, Transport};
