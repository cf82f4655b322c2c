//! MCP Method Surface
//!
//! The subset of the Model Context Protocol the server answers: lifecycle
//! (`initialize`, `ping`), tools (`tools/list`, `tools/call`) and read-only
//! resources (`resources/list`, `resources/read`). Payload shapes live here so
//! both transports render them identically.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Protocol revision reported by `initialize`
pub const PROTOCOL_VERSION: &str = "2025-03-26";

pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED: &str = "notifications/initialized";
pub const PING: &str = "ping";
pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";
pub const RESOURCES_LIST: &str = "resources/list";
pub const RESOURCES_READ: &str = "resources/read";

/// Resource holding the effective configuration and filter statistics
pub const SERVER_CONFIG_URI: &str = "math://server-config";
/// Resource listing exposed functions grouped by domain
pub const AVAILABLE_FUNCTIONS_URI: &str = "math://available-functions";

/// Name and version advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// One entry of a `tools/list` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// One entry of a `resources/list` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl ResourceDescriptor {
    pub fn json(uri: &str, name: &str, description: &str) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: description.into(),
            mime_type: "application/json".into(),
        }
    }
}

/// Result payload for `initialize`.
pub fn initialize_result(info: &ServerInfo, instructions: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {"listChanged": false},
            "resources": {"subscribe": false, "listChanged": false}
        },
        "serverInfo": info,
        "instructions": instructions,
    })
}

/// Result payload for a successful `tools/call`.
///
/// The value is rendered as text for clients that only read `content`, and
/// kept verbatim under `structuredContent.result`.
pub fn tool_result(value: &Value, elapsed: Duration, cache_hit: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": render_text(value)}],
        "structuredContent": {"result": value},
        "isError": false,
        "_meta": {
            "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
            "cache_hit": cache_hit,
        },
    })
}

/// Result payload for `resources/read`.
pub fn resource_contents(uri: &str, body: &Value) -> Value {
    let text = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
    json!({
        "contents": [{
            "uri": uri,
            "mimeType": "application/json",
            "text": text,
        }]
    })
}

/// Strings are shown bare, everything else as compact JSON.
pub fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
