//! Unit tests for MCP protocol model types

#[cfg(test)]
mod tests {
    use super::super::model::*;
    use crate::{Error, ErrorCode};
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(1, "tools/list", json!({}));

        let serialized = serde_json::to_string(&request).unwrap();
        let deserialized: Request = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized.jsonrpc, "2.0");
        assert_eq!(deserialized.method, "tools/list");
        assert_eq!(deserialized.id, Some(json!(1)));
    }

    #[test]
    fn test_notification_omits_id() {
        let notification = Request::notification("notifications/initialized", json!({}));
        let value = serde_json::to_value(&notification).unwrap();

        assert!(value.get("id").is_none());
        assert!(notification.is_notification());
        assert_eq!(notification.response_id(), serde_json::Value::Null);
    }

    #[test]
    fn test_response_with_result() {
        let response = Response::success(json!(1), json!({"tools": []}));

        let serialized = serde_json::to_string(&response).unwrap();
        assert!(serialized.contains("\"result\""));
        assert!(!serialized.contains("\"error\""));
        assert!(!response.is_error());
    }

    #[test]
    fn test_response_with_error() {
        let response = Response::error(json!("a"), Error::method_not_found("nope"));

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], json!(-32601));
        assert_eq!(value["id"], json!("a"));
        assert!(response.is_error());
    }

    #[test]
    fn test_call_tool_params_from_params() {
        let params = CallToolRequestParam::from_params(&json!({
            "name": "echo",
            "arguments": {"text": "hi"}
        }))
        .unwrap();

        assert_eq!(params.name, "echo");
        assert_eq!(params.arguments.get("text"), Some(&json!("hi")));
    }

    #[test]
    fn test_call_tool_params_require_name_and_arguments() {
        let missing_name = CallToolRequestParam::from_params(&json!({"arguments": {}}));
        assert_eq!(missing_name.unwrap_err().code, ErrorCode::InvalidParams);

        let numeric_name = CallToolRequestParam::from_params(&json!({"name": 3, "arguments": {}}));
        assert_eq!(numeric_name.unwrap_err().code, ErrorCode::InvalidParams);

        let array_arguments =
            CallToolRequestParam::from_params(&json!({"name": "echo", "arguments": []}));
        assert_eq!(array_arguments.unwrap_err().code, ErrorCode::InvalidParams);

        let missing_arguments = CallToolRequestParam::from_params(&json!({"name": "echo"}));
        assert!(missing_arguments.is_err());
    }

    #[test]
    fn test_call_tool_result_wraps_strings_verbatim() {
        let result = CallToolResult::from_value(&json!("plain text"));
        assert_eq!(result.content[0].as_text(), Some("plain text"));
        assert!(!result.is_error);
    }

    #[test]
    fn test_call_tool_result_renders_json() {
        let result = CallToolResult::from_value(&json!({"rating": 4.5}));
        let text = result.content[0].as_text().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, json!({"rating": 4.5}));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], json!(false));
        assert_eq!(value["content"][0]["type"], json!("text"));
    }

    #[test]
    fn test_tool_uses_camel_case_schema() {
        let tool = Tool {
            name: "echo".to_string(),
            description: "Echo input".to_string(),
            input_schema: json!({"type": "object"}),
        };
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["inputSchema"], json!({"type": "object"}));
    }

    #[test]
    fn test_initialize_result_serialization() {
        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "beacon".to_string(),
                version: "0.1.0".to_string(),
            },
            instructions: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["protocolVersion"], json!("2024-11-05"));
        assert_eq!(value["serverInfo"]["name"], json!("beacon"));
        assert_eq!(value["capabilities"]["tools"]["listChanged"], json!(false));
        assert!(InitializeResult::is_well_formed(&value));
    }

    #[test]
    fn test_initialize_result_well_formed_checks() {
        assert!(InitializeResult::is_well_formed(&json!({"serverInfo": {"name": "x"}})));
        assert!(InitializeResult::is_well_formed(&json!({"protocolVersion": "2024-11-05"})));
        assert!(!InitializeResult::is_well_formed(&json!({})));
        assert!(!InitializeResult::is_well_formed(&json!({"serverInfo": "x"})));
        assert!(!InitializeResult::is_well_formed(&json!(null)));
        assert!(!InitializeResult::is_well_formed(&json!("ok")));
    }
}
