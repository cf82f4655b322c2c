//! JSON-RPC 2.0 Envelope
//!
//! Both transports carry JSON-RPC 2.0 messages:
//! - Request format: `{"jsonrpc": "2.0", "method": "...", "params": ..., "id": ...}`
//! - Response format: `{"jsonrpc": "2.0", "result": ... | "error": ..., "id": ...}`
//! - Error format: `{"code": ..., "message": "...", "data": ...}`
//!
//! A request without an `id` is a notification and never gets a response.
//!
//! # Error Codes
//!
//! - `-32700`: Parse error
//! - `-32600`: Invalid request
//! - `-32601`: Method not found (also: unknown function)
//! - `-32602`: Invalid params (also: invalid arguments)
//! - `-32603`: Internal error
//! - `-32000`: Function execution error
//! - `-32001`: Request too large
//! - `-32002`: Call timed out
//! - `-32003`: Rate limited
//!
//! # Example
//!
//! ```
//! use mcpmath_common::protocol::jsonrpc::{JsonRpcError, JsonRpcResponse};
//! use serde_json::json;
//!
//! let ok = JsonRpcResponse::success(json!(1), json!({"tools": []}));
//! assert!(ok.error.is_none());
//!
//! let err = JsonRpcResponse::error(json!(1), JsonRpcError::method_not_found());
//! assert_eq!(err.error.unwrap().code, -32601);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version string
pub const VERSION: &str = "2.0";

/// Invalid JSON was received by the server
pub const PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid Request object
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist / is not available
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameter(s)
pub const INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i32 = -32603;
/// Application error raised by a function
pub const SERVER_ERROR: i32 = -32000;
/// Request entity too large
pub const REQUEST_TOO_LARGE: i32 = -32001;
/// The call did not finish before its deadline
pub const TIMEOUT: i32 = -32002;
/// The caller is over its request budget
pub const RATE_LIMITED: i32 = -32003;

/// JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Name of the method to invoke
    pub method: String,
    /// Parameter values; missing params decode as `null`
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    /// Request identifier; `None` marks a notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request with the given id.
    pub fn new(id: Value, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: VERSION.into(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Creates a notification (a request that expects no response).
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: VERSION.into(),
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// The id to echo back; `null` for notifications.
    pub fn response_id(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }
}

/// JSON-RPC 2.0 response.
///
/// Exactly one of `result` and `error` is present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Result value on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier (matches the request id, `null` if unknown)
    pub id: Value,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: VERSION.into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: VERSION.into(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Error code, if this is an error response.
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Error code (standard codes are negative integers)
    pub code: i32,
    /// Short description of the error
    pub message: String,
    /// Additional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data to the error.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: &str) -> Self {
        Self::new(INVALID_PARAMS, msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: &str) -> Self {
        Self::new(INTERNAL_ERROR, msg)
    }

    /// Create a request too large error (-32001)
    pub fn request_too_large(limit: usize) -> Self {
        Self::new(
            REQUEST_TOO_LARGE,
            format!("Request too large (max {} bytes)", limit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_id_is_notification() {
        let json = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(req.is_notification());
        assert_eq!(req.params, Value::Null);
        assert_eq!(req.response_id(), Value::Null);
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"add"},"id":"abc"}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "tools/call");
        assert_eq!(req.params, json!({"name": "add"}));
        assert_eq!(req.id, Some(json!("abc")));
    }

    #[test]
    fn test_success_response_omits_error() {
        let res = JsonRpcResponse::success(json!(1), json!({"ok": true}));
        let text = serde_json::to_string(&res).unwrap();
        assert!(text.contains("\"result\""));
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn test_error_response_omits_result() {
        let res = JsonRpcResponse::error(json!(2), JsonRpcError::method_not_found());
        let text = serde_json::to_string(&res).unwrap();
        assert!(!text.contains("\"result\""));
        assert_eq!(res.error_code(), Some(METHOD_NOT_FOUND));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcError::parse_error().code, -32700);
        assert_eq!(JsonRpcError::invalid_request().code, -32600);
        assert_eq!(JsonRpcError::method_not_found().code, -32601);
        assert_eq!(JsonRpcError::invalid_params("x").code, -32602);
        assert_eq!(JsonRpcError::internal_error("x").code, -32603);
        assert_eq!(JsonRpcError::request_too_large(10).code, -32001);
    }

    #[test]
    fn test_error_with_data() {
        let err = JsonRpcError::invalid_params("bad").with_data(json!({"kind": "invalid_arguments"}));
        assert_eq!(err.data, Some(json!({"kind": "invalid_arguments"})));
    }
}
