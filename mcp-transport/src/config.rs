//! SSE transport configuration

use crate::TransportError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for [`crate::SseTransport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Perform the `initialize` handshake on the client's behalf
    pub auto_initialize: bool,

    /// Interval between `heartbeat` events
    pub heartbeat_interval_ms: u64,

    /// Upper bound on the initializing state
    pub initialization_timeout_ms: u64,

    /// Maximum number of concurrently open streams
    pub max_connections: usize,

    /// Close connections without activity for this long; disabled when unset
    pub idle_timeout_secs: Option<u64>,

    /// Enable permissive CORS
    pub enable_cors: bool,

    /// Maximum accepted request body, in bytes
    pub max_message_size: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            auto_initialize: true,
            heartbeat_interval_ms: 30_000,
            initialization_timeout_ms: 10_000,
            max_connections: 100,
            idle_timeout_secs: None,
            enable_cors: true,
            max_message_size: 10 * 1024 * 1024,
        }
    }
}

impl SseConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_auto_initialize(mut self, auto_initialize: bool) -> Self {
        self.auto_initialize = auto_initialize;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn initialization_timeout(&self) -> Duration {
        Duration::from_millis(self.initialization_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Parsed bind address
    pub fn bind_address(&self) -> Result<SocketAddr, TransportError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| TransportError::Config(format!("Invalid address: {e}")))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), TransportError> {
        self.bind_address()?;

        if self.heartbeat_interval_ms == 0 {
            return Err(TransportError::Config(
                "heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.initialization_timeout_ms == 0 {
            return Err(TransportError::Config(
                "initialization_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(TransportError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.idle_timeout_secs == Some(0) {
            return Err(TransportError::Config(
                "idle_timeout_secs must be greater than zero when set".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(TransportError::Config(
                "max_message_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
