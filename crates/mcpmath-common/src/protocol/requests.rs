use serde_json::{Map, Value};
use std::time::Duration;

use super::jsonrpc::JsonRpcError;

/// A single function call extracted from a `tools/call` request.
///
/// `timeout` is the client's requested deadline; the dispatcher clamps it to
/// the configured computation timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Correlation id echoed back in the result
    pub id: Value,
    /// Function name
    pub name: String,
    /// Named argument values, in whatever order the client sent them
    pub arguments: Map<String, Value>,
    /// Requested timeout override
    pub timeout: Option<Duration>,
}

impl CallRequest {
    /// Creates a call with no arguments and a `null` correlation id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Value::Null,
            name: name.into(),
            arguments: Map::new(),
            timeout: None,
        }
    }

    pub fn with_id(mut self, id: Value) -> Self {
        self.id = id;
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds a call from `tools/call` params.
    ///
    /// Expected shape: `{"name": "...", "arguments": {...}, "_meta": {"timeout_ms": N}}`.
    /// `arguments` and `_meta` are optional.
    ///
    /// # Errors
    ///
    /// Returns an invalid-params error when `name` is missing or not a string,
    /// when `arguments` is neither an object nor `null`, or when `timeout_ms`
    /// is not a positive number.
    pub fn from_params(id: Value, params: &Value) -> Result<Self, JsonRpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| JsonRpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires a string 'name'"))?;

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(JsonRpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ))
            }
        };

        let timeout = match params.get("_meta").and_then(|meta| meta.get("timeout_ms")) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let millis = value
                    .as_f64()
                    .filter(|ms| ms.is_finite() && *ms > 0.0)
                    .ok_or_else(|| {
                        JsonRpcError::invalid_params("'_meta.timeout_ms' must be a positive number")
                    })?;
                // Past Duration's range the request is clamped anyway
                Some(Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX))
            }
        };

        Ok(Self {
            id,
            name: name.to_string(),
            arguments,
            timeout,
        })
    }
}
