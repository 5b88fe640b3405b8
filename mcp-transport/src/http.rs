//! HTTP endpoints: the SSE stream and the message side channel

use crate::config::SseConfig;
use crate::registry::ConnectionRegistry;
use crate::{SharedHandler, Transport, TransportError};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as AxumResponse, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_mcp_logging::StructuredLogger;
use beacon_mcp_protocol::{
    extract_id, DefaultErrorClassifier, Error, ErrorClassifier, Request, Response,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

/// Upper bound on the idle reaper's polling period
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// How long `stop` waits for the server task to drain
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Build the transport's router around a connection registry
///
/// - `GET /sse` opens an event stream (`503` at capacity)
/// - `POST /messages/:connection_id` submits one request or notification
/// - `GET /health` reports the number of open connections
pub fn router(registry: Arc<ConnectionRegistry>) -> Router {
    let max_message_size = registry.config().max_message_size;
    let enable_cors = registry.config().enable_cors;

    let app = Router::new()
        .route("/sse", get(handle_sse))
        .route("/messages/:connection_id", post(handle_message))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_message_size))
        .with_state(registry);

    if enable_cors {
        app.layer(ServiceBuilder::new().layer(CorsLayer::very_permissive()))
    } else {
        app
    }
}

/// Closes its connection when the SSE response stream is dropped
struct DisconnectGuard {
    registry: Weak<ConnectionRegistry>,
    connection_id: String,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.close(&self.connection_id, "client_disconnected") {
                info!(connection_id = %self.connection_id, "Client disconnected");
            }
        }
    }
}

/// Handle SSE requests (server-to-client streaming)
async fn handle_sse(State(registry): State<Arc<ConnectionRegistry>>) -> AxumResponse {
    let (connection, mut events) = match registry.open() {
        Ok(opened) => opened,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let connection_id = connection.id().to_string();
    info!(connection_id = %connection_id, "Starting SSE stream");

    let guard = DisconnectGuard {
        registry: Arc::downgrade(&registry),
        connection_id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        let mut event_counter = 0u64;

        // Ends once the connection drops its sink, after buffered events
        while let Some(event) = events.recv().await {
            event_counter += 1;
            yield Ok::<_, Infallible>(event.to_sse(event_counter));
        }
    };

    let mut response = Sse::new(stream).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
        .headers_mut()
        .insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}

fn rpc_error(status: StatusCode, id: Value, error: Error) -> AxumResponse {
    (status, Json(Response::error(id, error))).into_response()
}

/// Handle POST requests (client-to-server messages)
async fn handle_message(
    State(registry): State<Arc<ConnectionRegistry>>,
    Path(connection_id): Path<String>,
    body: Bytes,
) -> AxumResponse {
    if !registry.contains(&connection_id) {
        debug!(connection_id = %connection_id, "Message for unknown connection");
        return rpc_error(
            StatusCode::NOT_FOUND,
            Value::Null,
            Error::invalid_request(format!("Connection not found: {connection_id}")),
        );
    }

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(connection_id = %connection_id, "Failed to parse JSON: {}", e);
            return rpc_error(
                StatusCode::BAD_REQUEST,
                Value::Null,
                Error::parse_error(format!("Parse error: {e}")),
            );
        }
    };

    let id = extract_id(&value);
    let request = match Request::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            warn!(connection_id = %connection_id, error = %e, "Invalid JSON-RPC envelope");
            return rpc_error(StatusCode::BAD_REQUEST, id, e);
        }
    };

    debug!(
        connection_id = %connection_id,
        method = %request.method,
        request_id = %id,
        "Received message"
    );

    match registry.submit(&connection_id, request) {
        Ok(queued) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "accepted",
                "connectionId": connection_id,
                "queued": queued,
            })),
        )
            .into_response(),
        Err(e) => {
            debug!(connection_id = %connection_id, error = %e, "Submission refused");
            rpc_error(StatusCode::NOT_FOUND, id, Error::invalid_request(e.to_string()))
        }
    }
}

/// Handle health check requests
async fn handle_health(State(registry): State<Arc<ConnectionRegistry>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": registry.len(),
    }))
}

/// Periodically close connections idle for `max_idle` or longer
pub fn spawn_idle_reaper(registry: Arc<ConnectionRegistry>, max_idle: Duration) -> JoinHandle<()> {
    let period = max_idle.min(CLEANUP_INTERVAL);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let reaped = registry.reap_idle(max_idle);
            if reaped > 0 {
                debug!(reaped, "Closed idle connections");
            }
        }
    })
}

/// SSE transport for MCP protocol
///
/// Serves [`router`] on the configured address. Connections live in a
/// [`ConnectionRegistry`] created on [`Transport::start`] and torn down on
/// [`Transport::stop`].
pub struct SseTransport {
    config: SseConfig,
    classifier: Arc<dyn ErrorClassifier>,
    logger: Arc<StructuredLogger>,
    registry: Option<Arc<ConnectionRegistry>>,
    server_handle: Option<JoinHandle<()>>,
    reaper_handle: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl SseTransport {
    pub fn new(config: SseConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(DefaultErrorClassifier::new()),
            logger: Arc::new(StructuredLogger::new("sse-transport")),
            registry: None,
            server_handle: None,
            reaper_handle: None,
            shutdown: None,
            local_addr: None,
        }
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

    /// Live connection registry, while running
    pub fn connections(&self) -> Option<Arc<ConnectionRegistry>> {
        self.registry.clone()
    }

    /// Address actually bound, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Connection registry wired to this transport's handler, classifier and logger
    pub fn build_registry(&self, handler: SharedHandler) -> ConnectionRegistry {
        ConnectionRegistry::new(self.config.clone())
            .with_handler(handler)
            .with_classifier(Arc::clone(&self.classifier))
            .with_logger(Arc::clone(&self.logger))
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&mut self, handler: SharedHandler) -> Result<(), TransportError> {
        if self.registry.is_some() {
            return Err(TransportError::AlreadyRunning);
        }

        self.config.validate()?;
        let addr = self.config.bind_address()?;

        let registry = Arc::new(self.build_registry(handler));
        let app = router(Arc::clone(&registry));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Connection(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener.local_addr().unwrap_or(addr);

        info!("SSE transport listening on {}", local_addr);
        info!("Endpoints:");
        info!("  GET    http://{}/sse                       - Server-Sent Events", local_addr);
        info!("  POST   http://{}/messages/:connection_id   - MCP messages", local_addr);
        info!("  GET    http://{}/health                    - Health check", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("SSE server error: {}", e);
            }
        });

        self.reaper_handle = self
            .config
            .idle_timeout()
            .map(|max_idle| spawn_idle_reaper(Arc::clone(&registry), max_idle));
        self.registry = Some(registry);
        self.server_handle = Some(server_handle);
        self.shutdown = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        let registry = self.registry.take().ok_or(TransportError::NotRunning)?;
        info!("Stopping SSE transport");

        if let Some(handle) = self.reaper_handle.take() {
            handle.abort();
        }

        let closed = registry.close_all("server_shutdown");
        debug!(closed, "Closed connections on shutdown");

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.server_handle.take() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("SSE server did not shut down in time, aborting");
                abort.abort();
            }
        }

        self.local_addr = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        if self.registry.is_some() {
            Ok(())
        } else {
            Err(TransportError::NotRunning)
        }
    }
}
