//! SSE transport for Beacon MCP servers
//!
//! Clients open a long-lived Server-Sent Events stream on `GET /sse` and submit
//! JSON-RPC requests on `POST /messages/:connection_id`. Every stream gets its
//! own connection state machine (connecting, initializing, ready, closed), an
//! automatic `initialize` handshake, a queue for requests submitted before the
//! handshake completes, heartbeats and an initialization timeout.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use beacon_mcp_transport::{SseConfig, SseTransport, Transport};
//! use beacon_mcp_protocol::{Request, Response};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), beacon_mcp_transport::TransportError> {
//! let handler = |request: Request| async move {
//!     Ok::<_, anyhow::Error>(
//!         request
//!             .id
//!             .map(|id| Response::success(id, json!({"serverInfo": {"name": "demo"}}))),
//!     )
//! };
//!
//! let mut transport = SseTransport::new(SseConfig::default());
//! transport.start(Arc::new(handler)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod event;
pub mod http;
pub mod queue;
pub mod registry;
pub mod sequencer;

#[cfg(test)]
mod config_tests;

use async_trait::async_trait;
use beacon_mcp_protocol::{Request, Response};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error as ThisError;

pub use config::SseConfig;
pub use connection::{Admission, Connection, ConnectionState};
pub use event::{InitializationError, InitializationErrorKind, StreamEvent};
pub use http::{router, SseTransport};
pub use queue::{PendingRequest, QueueError, RequestQueue};
pub use registry::{ConnectionRegistry, SubmitError};
pub use sequencer::InitializationSequencer;

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Transport configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection limit reached ({0} active)")]
    CapacityReached(usize),

    #[error("Transport is already running")]
    AlreadyRunning,

    #[error("Transport is not running")]
    NotRunning,
}

/// Handles one decoded JSON-RPC request or notification
///
/// Returning `Ok(None)` means "no response", which is the expected outcome for
/// notifications. Failures are classified by the transport and reported to the
/// client as JSON-RPC error envelopes.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request) -> anyhow::Result<Option<Response>>;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Response>>> + Send + 'static,
{
    async fn handle(&self, request: Request) -> anyhow::Result<Option<Response>> {
        (self)(request).await
    }
}

/// Shared request handler
pub type SharedHandler = Arc<dyn RequestHandler>;

/// Transport layer trait
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start(&mut self, handler: SharedHandler) -> std::result::Result<(), TransportError>;
    async fn stop(&mut self) -> std::result::Result<(), TransportError>;
    async fn health_check(&self) -> std::result::Result<(), TransportError>;
}
