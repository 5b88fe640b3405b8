//! Classification of decoded JSON-RPC messages

use crate::{Error, Request, Response, JSONRPC_VERSION};
use serde_json::Value;

/// A single decoded JSON-RPC message
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    /// Carries an id and expects exactly one response
    Request(Request),
    /// No id, never answered
    Notification(Request),
    /// Result or error for an earlier request
    Response(Response),
}

impl ProtocolMessage {
    /// Classify an undecoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the value is not an object, lacks the
    /// `"jsonrpc": "2.0"` marker, has a non-string method, carries a request
    /// id that is null or neither string nor number, or is a response that
    /// does not carry exactly one of `result` and `error`.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid_request("Message must be a JSON object"))?;

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            Some(other) => {
                return Err(Error::invalid_request(format!(
                    "Unsupported jsonrpc version: {other}"
                )));
            }
            None => return Err(Error::invalid_request("Missing jsonrpc version marker")),
        }

        if let Some(method) = object.get("method") {
            if !method.is_string() {
                return Err(Error::invalid_request("Method must be a string"));
            }
            match object.get("id") {
                None => {}
                Some(id) if id.is_string() || id.is_number() => {}
                Some(Value::Null) => {
                    return Err(Error::invalid_request("Request id must not be null"));
                }
                Some(_) => {
                    return Err(Error::invalid_request("Request id must be a string or number"));
                }
            }
            let request: Request = serde_json::from_value(value)
                .map_err(|e| Error::invalid_request(format!("Malformed request: {e}")))?;
            return Ok(if request.is_notification() {
                ProtocolMessage::Notification(request)
            } else {
                ProtocolMessage::Request(request)
            });
        }

        let has_result = object.contains_key("result");
        let has_error = object.contains_key("error");
        if has_result == has_error {
            return Err(Error::invalid_request(
                "Missing method (or a response without exactly one of result and error)",
            ));
        }

        let response: Response = serde_json::from_value(value)
            .map_err(|e| Error::invalid_request(format!("Malformed response: {e}")))?;
        Ok(ProtocolMessage::Response(response))
    }

    /// The id this message carries, if any
    pub fn id(&self) -> Option<&Value> {
        match self {
            ProtocolMessage::Request(request) => request.id.as_ref(),
            ProtocolMessage::Notification(_) => None,
            ProtocolMessage::Response(response) => Some(&response.id),
        }
    }
}

/// Best-effort id extraction from a message that failed validation
pub fn extract_id(value: &Value) -> Value {
    value
        .get("id")
        .filter(|id| id.is_string() || id.is_number())
        .cloned()
        .unwrap_or(Value::Null)
}
