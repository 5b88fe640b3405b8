//! Tests for the protocol dispatcher

use crate::dispatcher::{DispatcherConfig, Method, ProtocolDispatcher};
use crate::registry::{ToolDescriptor, ToolRegistry};
use beacon_mcp_protocol::*;
use beacon_mcp_transport::RequestHandler;
use serde_json::{json, Value};
use std::sync::Arc;

fn dispatcher() -> ProtocolDispatcher {
    let registry = Arc::new(ToolRegistry::new());
    registry
        .register_all(vec![
            ToolDescriptor::from_fn(
                "echo",
                "Echo the text argument",
                json!({"type": "object", "properties": {"text": {"type": "string"}}}),
                |arguments| async move {
                    Ok(arguments.get("text").cloned().unwrap_or(Value::Null))
                },
            ),
            ToolDescriptor::from_fn(
                "lookup_app",
                "Return structured app details",
                json!({"type": "object"}),
                |_| async move { Ok(json!({"id": 553834731, "title": "Weather"})) },
            ),
            ToolDescriptor::from_fn(
                "throttled",
                "Always rate limited",
                json!({"type": "object"}),
                |_| async move { Err(anyhow::anyhow!("upstream returned 429 Too Many Requests")) },
            ),
            ToolDescriptor::from_fn(
                "strict",
                "Fails with a typed protocol error",
                json!({"type": "object"}),
                |_| async move { Err(Error::validation_error("term is required").into()) },
            ),
        ])
        .unwrap();

    ProtocolDispatcher::new(
        registry,
        DispatcherConfig::new("test-server", "0.1.0").with_instructions("Use the tools"),
    )
}

fn call(id: i64, name: &str, arguments: Value) -> Request {
    Request::new(id, "tools/call", json!({"name": name, "arguments": arguments}))
}

#[test]
fn test_method_table() {
    assert_eq!(Method::from_name("initialize"), Some(Method::Initialize));
    assert_eq!(
        Method::from_name("notifications/initialized"),
        Some(Method::Initialized)
    );
    assert_eq!(Method::from_name("tools/list"), Some(Method::ListTools));
    assert_eq!(Method::from_name("tools/call"), Some(Method::CallTool));
    assert_eq!(Method::from_name("resources/list"), None);
    assert_eq!(Method::from_name("ping"), None);
    assert_eq!(Method::CallTool.to_string(), "tools/call");
}

#[test]
fn test_dispatcher_config_default() {
    let config = DispatcherConfig::default();
    assert_eq!(config.server_info.name, "beacon-mcp");
    assert!(!config.server_info.version.is_empty());
    assert!(config.instructions.is_none());
}

#[tokio::test]
async fn test_initialize_ignores_client_parameters() {
    let dispatcher = dispatcher();
    let request = Request::new(
        1,
        "initialize",
        json!({
            "protocolVersion": "1999-01-01",
            "capabilities": {"sampling": {}},
            "clientInfo": {"name": "client", "version": "9"}
        }),
    );

    let response = dispatcher.handle(request).await.unwrap();
    assert_eq!(response.id, json!(1));
    let result: InitializeResult = serde_json::from_value(response.result.unwrap()).unwrap();

    assert_eq!(result.protocol_version, MCP_VERSION);
    assert_eq!(result.server_info.name, "test-server");
    assert_eq!(result.server_info.version, "0.1.0");
    assert_eq!(result.instructions.as_deref(), Some("Use the tools"));
    assert!(result.capabilities.tools.is_some());
}

#[tokio::test]
async fn test_initialize_result_is_well_formed() {
    let response = dispatcher()
        .handle(Request::new("beacon-init-x", "initialize", Value::Null))
        .await
        .unwrap();
    assert!(InitializeResult::is_well_formed(&response.result.unwrap()));
}

#[tokio::test]
async fn test_initialized_notification_has_no_response() {
    let dispatcher = dispatcher();

    let notification = Request::notification("notifications/initialized", json!({}));
    assert!(dispatcher.handle(notification).await.is_none());

    let with_id = Request::new(5, "notifications/initialized", Value::Null);
    let response = dispatcher.handle(with_id).await.unwrap();
    assert_eq!(response.result, Some(json!({})));
    assert!(response.error.is_none());
}

#[tokio::test]
async fn test_notifications_never_answered() {
    let dispatcher = dispatcher();
    assert!(dispatcher
        .handle(Request::notification("unknown/method", json!({})))
        .await
        .is_none());
    assert!(dispatcher
        .handle(Request::notification("tools/call", json!({"name": "missing"})))
        .await
        .is_none());
}

#[tokio::test]
async fn test_list_tools() {
    let response = dispatcher()
        .handle(Request::new(2, "tools/list", json!({})))
        .await
        .unwrap();

    let result: ListToolsResult = serde_json::from_value(response.result.unwrap()).unwrap();
    let names: Vec<&str> = result.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "lookup_app", "strict", "throttled"]);
    assert_eq!(result.tools[0].description, "Echo the text argument");
    assert_eq!(result.tools[0].input_schema["type"], "object");
}

#[tokio::test]
async fn test_call_tool_string_result() {
    let response = dispatcher()
        .handle(call(3, "echo", json!({"text": "hello"})))
        .await
        .unwrap();

    assert_eq!(
        response.result,
        Some(json!({
            "content": [{"type": "text", "text": "hello"}],
            "isError": false
        }))
    );
}

#[tokio::test]
async fn test_call_tool_structured_result() {
    let response = dispatcher()
        .handle(call(4, "lookup_app", json!({})))
        .await
        .unwrap();

    let result: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
    let text = result.content[0].as_text().unwrap();
    let parsed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(parsed, json!({"id": 553834731, "title": "Weather"}));
    assert!(!result.is_error);
}

#[tokio::test]
async fn test_call_unknown_tool_is_not_found() {
    let response = dispatcher()
        .handle(call(6, "missing", json!({})))
        .await
        .unwrap();

    let error = response.error.unwrap();
    assert_eq!(error.code, ErrorCode::ToolNotFound);
    assert_eq!(error.message, "Tool not found: missing");

    let data = error.data.unwrap();
    assert_eq!(data["category"], "not_found");
    assert_eq!(data["retryable"], false);
    assert_eq!(data["correlationId"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn test_call_tool_parameter_validation() {
    let dispatcher = dispatcher();

    let missing_name = Request::new(7, "tools/call", json!({"arguments": {}}));
    let error = dispatcher.handle(missing_name).await.unwrap().error.unwrap();
    assert_eq!(error.code, ErrorCode::InvalidParams);
    assert_eq!(error.data.unwrap()["category"], "validation");

    let bad_arguments = Request::new(8, "tools/call", json!({"name": "echo", "arguments": []}));
    let error = dispatcher.handle(bad_arguments).await.unwrap().error.unwrap();
    assert_eq!(error.code, ErrorCode::InvalidParams);
    assert_eq!(error.message, "params.arguments must be an object");

    let no_params = Request::new(9, "tools/call", Value::Null);
    let error = dispatcher.handle(no_params).await.unwrap().error.unwrap();
    assert_eq!(error.code, ErrorCode::InvalidParams);
}

#[tokio::test]
async fn test_tool_failures_are_classified() {
    let dispatcher = dispatcher();

    let error = dispatcher
        .handle(call(10, "throttled", json!({})))
        .await
        .unwrap()
        .error
        .unwrap();
    assert_eq!(error.code, ErrorCode::RateLimitExceeded);
    let data = error.data.unwrap();
    assert_eq!(data["category"], "rate_limiting");
    assert_eq!(data["retryable"], true);

    let error = dispatcher
        .handle(call(11, "strict", json!({})))
        .await
        .unwrap()
        .error
        .unwrap();
    assert_eq!(error.code, ErrorCode::ValidationError);
    assert_eq!(error.message, "term is required");
}

#[tokio::test]
async fn test_unknown_method() {
    let response = dispatcher()
        .handle(Request::new("abc", "resources/list", json!({})))
        .await
        .unwrap();

    assert_eq!(response.id, json!("abc"));
    let error = response.error.unwrap();
    assert_eq!(error.code, ErrorCode::MethodNotFound);
    assert_eq!(error.message, "Method not found: resources/list");
}

#[tokio::test]
async fn test_correlation_ids_differ_per_request() {
    let dispatcher = dispatcher();
    let first = dispatcher.handle(call(1, "missing", json!({}))).await.unwrap();
    let second = dispatcher.handle(call(2, "missing", json!({}))).await.unwrap();

    let id_of = |response: &Response| {
        response.error.as_ref().unwrap().data.as_ref().unwrap()["correlationId"].clone()
    };
    assert_ne!(id_of(&first), id_of(&second));
}

#[tokio::test]
async fn test_dispatch_value_rejects_malformed_shapes() {
    let dispatcher = dispatcher();

    let response = dispatcher
        .dispatch_value(json!({"id": 1, "method": "tools/list"}))
        .await
        .unwrap();
    assert_eq!(response.id, json!(1));
    assert_eq!(response.error.unwrap().code, ErrorCode::InvalidRequest);

    let response = dispatcher
        .dispatch_value(json!({"jsonrpc": "2.0", "id": 2, "method": 42}))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, ErrorCode::InvalidRequest);

    let response = dispatcher
        .dispatch_value(json!({"jsonrpc": "2.0", "id": 3}))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, ErrorCode::InvalidRequest);

    let response = dispatcher.dispatch_value(json!([1, 2])).await.unwrap();
    assert_eq!(response.id, Value::Null);
    assert_eq!(response.error.unwrap().code, ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn test_dispatch_value_routes_valid_messages() {
    let dispatcher = dispatcher();

    let response = dispatcher
        .dispatch_value(json!({
            "jsonrpc": "2.0",
            "id": "x",
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": "hi"}}
        }))
        .await
        .unwrap();
    assert_eq!(response.id, json!("x"));
    assert!(response.result.is_some());

    assert!(dispatcher
        .dispatch_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await
        .is_none());
}

#[tokio::test]
async fn test_decoded_request_with_wrong_version() {
    let mut request = Request::new(1, "tools/list", json!({}));
    request.jsonrpc = "1.0".to_string();

    let error = dispatcher().handle(request).await.unwrap().error.unwrap();
    assert_eq!(error.code, ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn test_request_handler_contract() {
    let handler: Arc<dyn RequestHandler> = Arc::new(dispatcher());

    let response = handler
        .handle(Request::new(1, "tools/list", json!({})))
        .await
        .unwrap()
        .unwrap();
    assert!(response.result.is_some());

    let none = handler
        .handle(Request::notification("notifications/initialized", json!({})))
        .await
        .unwrap();
    assert!(none.is_none());
}
