//! MCP server: a tool registry and dispatcher served over the SSE transport

use crate::dispatcher::{DispatcherConfig, ProtocolDispatcher};
use crate::registry::ToolRegistry;
use beacon_mcp_logging::StructuredLogger;
use beacon_mcp_protocol::{DefaultErrorClassifier, ErrorClassifier, Implementation};
use beacon_mcp_transport::{ConnectionRegistry, SseConfig, SseTransport, Transport};

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::signal;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Error type for server operations
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server already running")]
    AlreadyRunning,

    #[error("Server not running")]
    NotRunning,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Identity reported in the handshake
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// SSE transport configuration
    #[serde(default)]
    pub transport: SseConfig,

    /// Stop on Ctrl-C when running through [`McpServer::run`]
    #[serde(default = "default_graceful_shutdown")]
    pub graceful_shutdown: bool,
}

fn default_graceful_shutdown() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            transport: SseConfig::default(),
            graceful_shutdown: default_graceful_shutdown(),
        }
    }
}

/// Tool server bound to the SSE transport
pub struct McpServer {
    dispatcher: Arc<ProtocolDispatcher>,
    transport: SseTransport,
    config: ServerConfig,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
    signal_listener: Option<JoinHandle<()>>,
    started_at: Option<Instant>,
}

impl McpServer {
    /// Create a server around an already populated tool registry
    pub fn new(registry: Arc<ToolRegistry>, config: ServerConfig) -> Result<Self, ServerError> {
        config
            .transport
            .validate()
            .map_err(|e| ServerError::Configuration(e.to_string()))?;

        let classifier: Arc<dyn ErrorClassifier> = Arc::new(DefaultErrorClassifier::new());
        let logger = Arc::new(StructuredLogger::new(config.dispatcher.server_info.name.clone()));

        let dispatcher = ProtocolDispatcher::new(registry, config.dispatcher.clone())
            .with_classifier(Arc::clone(&classifier))
            .with_logger(Arc::clone(&logger));

        let transport = SseTransport::new(config.transport.clone())
            .with_classifier(classifier)
            .with_logger(logger);

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            transport,
            config,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
            signal_listener: None,
            started_at: None,
        })
    }

    /// Start serving
    pub async fn start(&mut self) -> Result<(), ServerError> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(ServerError::AlreadyRunning);
            }
            *running = true;
        }

        info!(
            tools = self.dispatcher.registry().size(),
            "Starting MCP server"
        );

        if let Err(e) = self.transport.start(self.dispatcher.clone()).await {
            *self.running.write().await = false;
            return Err(ServerError::Transport(e.to_string()));
        }
        self.started_at = Some(Instant::now());

        if self.config.graceful_shutdown {
            let shutdown = Arc::clone(&self.shutdown);
            self.signal_listener = Some(tokio::spawn(async move {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        warn!("Shutdown signal received");
                        shutdown.notify_one();
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                }
            }));
        }

        info!("MCP server started successfully");
        Ok(())
    }

    /// Stop the server, closing every open connection
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        {
            let mut running = self.running.write().await;
            if !*running {
                return Err(ServerError::NotRunning);
            }
            *running = false;
        }

        info!("Stopping MCP server");

        if let Some(listener) = self.signal_listener.take() {
            listener.abort();
        }

        self.transport
            .stop()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;
        self.started_at = None;

        info!("MCP server stopped");
        Ok(())
    }

    /// Run until a shutdown signal arrives, then stop
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.start().await?;
        self.shutdown.notified().await;
        self.stop().await
    }

    /// Request a shutdown of a server inside [`McpServer::run`]
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Get server health status
    pub async fn health_check(&self) -> HealthStatus {
        let transport_healthy = self.transport.health_check().await.is_ok();

        HealthStatus {
            status: if transport_healthy {
                "healthy".to_string()
            } else {
                "unhealthy".to_string()
            },
            connections: self.connections().map_or(0, |registry| registry.len()),
            tools: self.dispatcher.registry().size(),
            uptime_seconds: self.started_at.map_or(0, |at| at.elapsed().as_secs()),
        }
    }

    pub fn dispatcher(&self) -> &Arc<ProtocolDispatcher> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.dispatcher.registry()
    }

    /// Live connections, while the transport is running
    pub fn connections(&self) -> Option<Arc<ConnectionRegistry>> {
        self.transport.connections()
    }

    /// Bound address, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    #[cfg(test)]
    pub(crate) fn has_signal_listener(&self) -> bool {
        self.signal_listener.is_some()
    }

    pub fn server_info(&self) -> &Implementation {
        &self.config.dispatcher.server_info
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Health status information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: usize,
    pub tools: usize,
    pub uptime_seconds: u64,
}
