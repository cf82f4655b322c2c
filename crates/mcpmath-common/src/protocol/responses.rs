use serde_json::{json, Value};
use std::time::Duration;

use super::error::CallErrorKind;
use super::jsonrpc::{JsonRpcError, JsonRpcResponse};
use super::mcp;

/// Outcome of one dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Success {
        /// Correlation id of the request
        id: Value,
        /// Value returned by the function (or the cache)
        value: Value,
        /// Wall time spent in dispatch
        elapsed: Duration,
        /// Whether the value came from the result cache
        cache_hit: bool,
    },
    Failure {
        /// Correlation id of the request
        id: Value,
        kind: CallErrorKind,
        message: String,
    },
}

impl CallResult {
    pub fn success(id: Value, value: Value, elapsed: Duration, cache_hit: bool) -> Self {
        CallResult::Success {
            id,
            value,
            elapsed,
            cache_hit,
        }
    }

    pub fn failure(id: Value, kind: CallErrorKind, message: impl Into<String>) -> Self {
        CallResult::Failure {
            id,
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success { .. })
    }

    pub fn id(&self) -> &Value {
        match self {
            CallResult::Success { id, .. } | CallResult::Failure { id, .. } => id,
        }
    }

    /// Failure kind, or `None` on success.
    pub fn kind(&self) -> Option<CallErrorKind> {
        match self {
            CallResult::Success { .. } => None,
            CallResult::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            CallResult::Success { value, .. } => Some(value),
            CallResult::Failure { .. } => None,
        }
    }

    pub fn cache_hit(&self) -> bool {
        matches!(self, CallResult::Success { cache_hit: true, .. })
    }

    /// Encodes the outcome as a `tools/call` JSON-RPC response.
    ///
    /// Successes become an MCP tool result; failures become a JSON-RPC error
    /// whose `data` carries the failure kind and the correlation id.
    pub fn into_response(self) -> JsonRpcResponse {
        match self {
            CallResult::Success {
                id,
                value,
                elapsed,
                cache_hit,
            } => JsonRpcResponse::success(id, mcp::tool_result(&value, elapsed, cache_hit)),
            CallResult::Failure { id, kind, message } => {
                let error = JsonRpcError::new(kind.code(), message).with_data(json!({
                    "kind": kind,
                    "correlation_id": id.clone(),
                }));
                JsonRpcResponse::error(id, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_into_response() {
        let result = CallResult::success(json!(1), json!(42), Duration::from_millis(5), true);
        assert!(result.cache_hit());

        let response = result.into_response();
        let body = response.result.unwrap();
        assert_eq!(body["structuredContent"]["result"], json!(42));
        assert_eq!(body["isError"], json!(false));
        assert_eq!(body["_meta"]["cache_hit"], json!(true));
        assert_eq!(response.id, json!(1));
    }

    #[test]
    fn test_failure_into_response() {
        let result = CallResult::failure(json!("req-9"), CallErrorKind::Timeout, "took too long");
        assert_eq!(result.kind(), Some(CallErrorKind::Timeout));

        let response = result.into_response();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32002);
        assert_eq!(error.message, "took too long");
        assert_eq!(error.data.as_ref().unwrap()["kind"], json!("timeout"));
        assert_eq!(error.data.as_ref().unwrap()["correlation_id"], json!("req-9"));
        assert_eq!(response.id, json!("req-9"));
    }

    #[test]
    fn test_accessors() {
        let ok = CallResult::success(json!(1), json!("x"), Duration::ZERO, false);
        assert_eq!(ok.value(), Some(&json!("x")));
        assert_eq!(ok.kind(), None);
        assert!(!ok.cache_hit());

        let err = CallResult::failure(json!(2), CallErrorKind::UnknownFunction, "nope");
        assert_eq!(err.value(), None);
        assert_eq!(err.id(), &json!(2));
    }
}
