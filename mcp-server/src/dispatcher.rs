//! Protocol dispatcher: routes decoded requests to the fixed method table
//! or to the tool registry

use crate::registry::ToolRegistry;
use async_trait::async_trait;
use beacon_mcp_logging::{StructuredContext, StructuredLogger};
use beacon_mcp_protocol::*;
use beacon_mcp_transport::RequestHandler;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Identity the server reports in the handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub server_info: Implementation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl DispatcherConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server_info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new("beacon-mcp", env!("CARGO_PKG_VERSION"))
    }
}

/// Methods the dispatcher understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Initialize,
    Initialized,
    ListTools,
    CallTool,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Method::Initialize),
            "notifications/initialized" => Some(Method::Initialized),
            "tools/list" => Some(Method::ListTools),
            "tools/call" => Some(Method::CallTool),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Initialized => "notifications/initialized",
            Method::ListTools => "tools/list",
            Method::CallTool => "tools/call",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routes one request to a method handler and produces its response
///
/// Every failure is passed through the injected [`ErrorClassifier`] and
/// returned as a JSON-RPC error whose `data` carries the category, the
/// retryable flag and the request's correlation id.
#[derive(Clone)]
pub struct ProtocolDispatcher {
    registry: Arc<ToolRegistry>,
    config: DispatcherConfig,
    classifier: Arc<dyn ErrorClassifier>,
    logger: Arc<StructuredLogger>,
}

impl ProtocolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, config: DispatcherConfig) -> Self {
        Self {
            registry,
            config,
            classifier: Arc::new(DefaultErrorClassifier::new()),
            logger: Arc::new(StructuredLogger::new("dispatcher")),
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

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Capabilities advertised in every handshake
    pub fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities::builder().enable_tools().build()
    }

    /// Validate and dispatch an undecoded JSON-RPC message.
    ///
    /// Malformed envelopes are answered with `InvalidRequest` before any
    /// routing happens.
    pub async fn dispatch_value(&self, value: Value) -> Option<Response> {
        let id = extract_id(&value);

        match ProtocolMessage::from_value(value) {
            Ok(ProtocolMessage::Request(request) | ProtocolMessage::Notification(request)) => {
                self.handle(request).await
            }
            Ok(ProtocolMessage::Response(_)) => Some(Response::error(
                id,
                Error::invalid_request("Expected a request, got a response"),
            )),
            Err(error) => {
                debug!(error = %error, "Rejected malformed message");
                Some(Response::error(id, error))
            }
        }
    }

    /// Dispatch a decoded request.
    ///
    /// Returns `None` for notifications, whatever their method.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle(&self, request: Request) -> Option<Response> {
        let id = request.id.clone();

        if request.jsonrpc != JSONRPC_VERSION {
            return id.map(|id| {
                Response::error(
                    id,
                    Error::invalid_request(format!(
                        "Unsupported jsonrpc version: {}",
                        request.jsonrpc
                    )),
                )
            });
        }

        let mut ctx = StructuredContext::new(request.method.clone())
            .with_request_id(&request.response_id());
        if let Some(tool) = request.params.get("name").and_then(Value::as_str) {
            if request.method == Method::CallTool.as_str() {
                ctx = ctx.with_tool(tool);
            }
        }

        self.logger.log_request_start(&ctx, &request.params);

        let outcome = self.route(&request).await;

        match outcome {
            Ok(result) => {
                self.logger.log_request_end::<ErrorInfo>(&ctx, None);
                id.map(|id| Response::success(id, result))
            }
            Err(error) => {
                let info = self
                    .classifier
                    .classify(&error)
                    .with_correlation_id(ctx.correlation_id.clone());
                self.logger.log_request_end(&ctx, Some(&info));
                id.map(|id| Response::error(id, info.into_error()))
            }
        }
    }

    async fn route(&self, request: &Request) -> anyhow::Result<Value> {
        let Some(method) = Method::from_name(&request.method) else {
            return Err(Error::method_not_found(&request.method).into());
        };

        match method {
            Method::Initialize => self.handle_initialize(),
            Method::Initialized => Ok(json!({})),
            Method::ListTools => self.handle_list_tools(),
            Method::CallTool => self.handle_call_tool(&request.params).await,
        }
    }

    fn handle_initialize(&self) -> anyhow::Result<Value> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: self.capabilities(),
            server_info: self.config.server_info.clone(),
            instructions: self.config.instructions.clone(),
        };

        Ok(serde_json::to_value(result)?)
    }

    fn handle_list_tools(&self) -> anyhow::Result<Value> {
        let result = ListToolsResult {
            tools: self.registry.list(),
            next_cursor: None,
        };

        Ok(serde_json::to_value(result)?)
    }

    async fn handle_call_tool(&self, params: &Value) -> anyhow::Result<Value> {
        let params = CallToolRequestParam::from_params(params)?;

        let tool = self
            .registry
            .lookup(&params.name)
            .ok_or_else(|| Error::tool_not_found(&params.name))?;

        let output = tool.handler.execute(params.arguments).await?;

        Ok(serde_json::to_value(CallToolResult::from_value(&output))?)
    }
}

impl fmt::Debug for ProtocolDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolDispatcher")
            .field("config", &self.config)
            .field("tools", &self.registry.size())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestHandler for ProtocolDispatcher {
    async fn handle(&self, request: Request) -> anyhow::Result<Option<Response>> {
        Ok(ProtocolDispatcher::handle(self, request).await)
    }
}
