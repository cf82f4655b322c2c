//! Protocol Router
//!
//! Maps JSON-RPC methods onto the server. Both transports hand every decoded
//! request to the same [`McpRouter`], so the method surface is identical over
//! the local channel and HTTP.
//!
//! # Methods
//!
//! - `initialize`, `ping`
//! - `tools/list`, `tools/call`
//! - `resources/list`, `resources/read`
//!
//! Requests without an id are notifications and never produce a response.

use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use mcpmath_common::protocol::mcp::{self, ResourceDescriptor, ToolDescriptor};
use mcpmath_common::rate_limit::RateLimitResult;
use mcpmath_common::{
    CallErrorKind, CallRequest, CallResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
};
use mcpmath_functions::ProgressSink;

use crate::server::McpMathServer;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Who sent a request; the rate limiter keys its buckets on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    /// An HTTP peer
    Peer(IpAddr),
    /// One local-channel session
    Session(u64),
}

impl Caller {
    /// A fresh local-channel session.
    pub fn session() -> Self {
        Caller::Session(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

/// JSON-RPC method router shared by all transports.
#[derive(Clone)]
pub struct McpRouter {
    server: Arc<McpMathServer>,
}

impl McpRouter {
    pub fn new(server: Arc<McpMathServer>) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &Arc<McpMathServer> {
        &self.server
    }

    /// Handles one request.
    ///
    /// # Arguments
    ///
    /// * `request` - A decoded JSON-RPC request
    /// * `caller` - The sender, for rate limiting
    /// * `progress` - Progress sink for a streamed `tools/call`
    ///
    /// # Returns
    ///
    /// The response to send, or `None` for a notification.
    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        caller: &Caller,
        progress: Option<ProgressSink>,
    ) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }
        let id = request.response_id();
        debug!(method = %request.method, %id, "Handling request");

        let response = match request.method.as_str() {
            mcp::INITIALIZE => self.initialize(id),
            mcp::PING => JsonRpcResponse::success(id, json!({})),
            mcp::TOOLS_LIST => self.list_tools(id),
            mcp::TOOLS_CALL => self.call(id, &request.params, caller, progress).await,
            mcp::RESOURCES_LIST => self.list_resources(id),
            mcp::RESOURCES_READ => self.read_resource(id, &request.params),
            other => {
                debug!(method = %other, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found())
            }
        };
        Some(response)
    }

    fn initialize(&self, id: Value) -> JsonRpcResponse {
        let config = self.server.config();
        JsonRpcResponse::success(
            id,
            mcp::initialize_result(&self.server.server_info(), &config.server_description),
        )
    }

    fn list_tools(&self, id: Value) -> JsonRpcResponse {
        let tools: Vec<ToolDescriptor> = self
            .server
            .catalog()
            .iter()
            .map(|f| ToolDescriptor {
                name: f.name().to_string(),
                description: format!("[{}/{}] {}", f.domain(), f.category(), f.description()),
                input_schema: f.input_schema(),
            })
            .collect();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    /// Runs `tools/call`: parse, rate check, dispatch.
    pub async fn call(
        &self,
        id: Value,
        params: &Value,
        caller: &Caller,
        progress: Option<ProgressSink>,
    ) -> JsonRpcResponse {
        let request = match CallRequest::from_params(id.clone(), params) {
            Ok(request) => request,
            Err(e) => return JsonRpcResponse::error(id, e),
        };

        if let RateLimitResult::RateLimited { retry_after } = self.server.check_rate(caller).await {
            warn!(?caller, function = %request.name, "Call rate limited");
            let mut response = CallResult::failure(
                id,
                CallErrorKind::RateLimited,
                format!("Rate limit exceeded, retry after {:?}", retry_after),
            )
            .into_response();
            if let Some(Value::Object(data)) = response.error.as_mut().and_then(|e| e.data.as_mut()) {
                data.insert(
                    "retry_after_ms".into(),
                    json!(retry_after.as_millis().max(1) as u64),
                );
            }
            return response;
        }

        // Hold on to the snapshot the call started with
        let catalog = self.server.catalog();
        self.server
            .dispatcher()
            .dispatch(request, &catalog, progress)
            .await
            .into_response()
    }

    fn list_resources(&self, id: Value) -> JsonRpcResponse {
        let resources = [
            ResourceDescriptor::json(
                mcp::SERVER_CONFIG_URI,
                "Server configuration",
                "Effective configuration and filter statistics",
            ),
            ResourceDescriptor::json(
                mcp::AVAILABLE_FUNCTIONS_URI,
                "Available functions",
                "Exposed functions grouped by domain",
            ),
        ];
        JsonRpcResponse::success(id, json!({ "resources": resources }))
    }

    fn read_resource(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let Some(uri) = params.get("uri").and_then(Value::as_str) else {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params("resources/read requires a string 'uri'"),
            );
        };

        let snapshot = self.server.snapshot();
        let body = match uri {
            mcp::SERVER_CONFIG_URI => json!({
                "config": snapshot.config.as_ref(),
                "filter_stats": snapshot.catalog.stats(),
            }),
            mcp::AVAILABLE_FUNCTIONS_URI => {
                let mut domains = serde_json::Map::new();
                for domain in snapshot.catalog.domains() {
                    let functions: Vec<Value> = snapshot
                        .catalog
                        .iter()
                        .filter(|f| f.domain() == domain)
                        .map(|f| {
                            json!({
                                "name": f.name(),
                                "category": f.category(),
                                "description": f.description(),
                            })
                        })
                        .collect();
                    domains.insert(domain.to_string(), Value::Array(functions));
                }
                json!({ "total": snapshot.catalog.len(), "domains": domains })
            }
            other => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(&format!("Unknown resource: {}", other)),
                )
            }
        };
        JsonRpcResponse::success(id, mcp::resource_contents(uri, &body))
    }
}
