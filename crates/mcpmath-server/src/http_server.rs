//! HTTP Transport
//!
//! Serves the protocol over HTTP using axum.
//!
//! # Endpoints
//!
//! - `GET /` - server status and filter statistics
//! - `GET /health` - health flag, slot usage and cache statistics (503 when
//!   unhealthy)
//! - `POST /mcp` - one JSON-RPC message per request
//!
//! A `tools/call` sent with `Accept: text/event-stream` is answered as a
//! server-sent event stream: `started`, any number of `progress`, then one
//! `result` event carrying the JSON-RPC response. Everything else gets a
//! single JSON body.
//!
//! # CORS
//!
//! With CORS enabled every endpoint carries permissive headers. With CORS
//! disabled, `/mcp` only accepts requests without an `Origin`, from the same
//! origin, or from an origin listed in `allowed_origins`; others get 403
//! before anything is dispatched.
//!
//! # Example
//!
//! ```no_run
//! use mcpmath_functions::Catalog;
//! use mcpmath_server::config::ServerConfig;
//! use mcpmath_server::http_server::HttpServer;
//! use mcpmath_server::McpMathServer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Arc::new(McpMathServer::new(ServerConfig::default(), Catalog::standard().unwrap()));
//!     HttpServer::new(server)
//!         .run_until("127.0.0.1:8000", async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//!         .unwrap();
//! }
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use mcpmath_common::protocol::jsonrpc::{INVALID_REQUEST, RATE_LIMITED};
use mcpmath_common::protocol::mcp;
use mcpmath_common::transport::decode_request;
use mcpmath_common::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpMathError, Result, StreamEvent,
};
use mcpmath_functions::ProgressUpdate;

use crate::router::{Caller, McpRouter};
use crate::server::McpMathServer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// HTTP server for mcpmath.
pub struct HttpServer {
    router: McpRouter,
}

impl HttpServer {
    pub fn new(server: Arc<McpMathServer>) -> Self {
        Self {
            router: McpRouter::new(server),
        }
    }

    /// Builds the axum application.
    ///
    /// CORS handling is decided here from the configuration the server
    /// started with.
    pub fn app(&self) -> Router {
        let config = self.router.server().config();
        let app = Router::new()
            .route("/", get(handle_status))
            .route("/health", get(handle_health))
            .route("/mcp", post(handle_mcp))
            .with_state(self.router.clone());

        if config.enable_cors {
            app.layer(CorsLayer::permissive())
        } else if !config.allowed_origins.is_empty() {
            app.layer(listed_origins(&config.allowed_origins))
        } else {
            app
        }
    }

    /// Binds `addr` and serves until `signal` resolves.
    ///
    /// # Errors
    /// [`McpMathError::Bind`] when the address cannot be bound.
    pub async fn run_until<F>(self, addr: &str, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| McpMathError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        self.serve_with_shutdown(listener, signal).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves until `signal` resolves, then drains open connections.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| McpMathError::Transport(format!("Failed to get local addr: {}", e)))?;
        info!("HTTP server listening on {}", local_addr);

        axum::serve(
            listener,
            self.app()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| McpMathError::Transport(format!("Server error: {}", e)))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

fn listed_origins(origins: &[String]) -> CorsLayer {
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring allowed origin that is not a valid header value");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(values))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

/// Same-origin when the origin's authority equals the `Host` header.
fn origin_allowed(origin: &str, host: Option<&str>, allowed: &[String]) -> bool {
    if allowed
        .iter()
        .any(|entry| entry == "*" || entry.trim_end_matches('/').eq_ignore_ascii_case(origin))
    {
        return true;
    }
    let authority = origin
        .split_once("://")
        .map_or(origin, |(_, rest)| rest)
        .trim_end_matches('/');
    host.is_some_and(|host| host.eq_ignore_ascii_case(authority))
}

fn wants_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

fn json_response(status: StatusCode, response: JsonRpcResponse) -> Response {
    (status, Json(response)).into_response()
}

async fn handle_status(State(router): State<McpRouter>) -> Json<Value> {
    Json(router.server().status())
}

async fn handle_health(State(router): State<McpRouter>) -> Response {
    let server = router.server();
    let status = if server.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(server.health())).into_response()
}

/// Handles `POST /mcp`.
async fn handle_mcp(
    State(router): State<McpRouter>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let config = router.server().config();
    if !config.enable_cors {
        if let Some(origin) = headers.get(header::ORIGIN) {
            let origin = origin.to_str().unwrap_or_default();
            let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
            if !origin_allowed(origin, host, &config.allowed_origins) {
                warn!(%origin, %peer, "Rejected request from disallowed origin");
                let error = JsonRpcError::new(INVALID_REQUEST, "Origin not allowed");
                return json_response(StatusCode::FORBIDDEN, JsonRpcResponse::error(json!(null), error));
            }
        }
    }

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(%peer, error = %e, "Rejected request body");
            return json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                JsonRpcResponse::error(json!(null), JsonRpcError::request_too_large(MAX_BODY_BYTES)),
            );
        }
    };

    let request = match decode_request(&bytes) {
        Ok(request) => request,
        Err(response) => {
            debug!(%peer, "Rejected undecodable request");
            return json_response(StatusCode::BAD_REQUEST, response);
        }
    };

    let caller = Caller::Peer(peer.ip());
    if wants_stream(&headers) && request.method == mcp::TOOLS_CALL && !request.is_notification() {
        return stream_call(router, request, caller);
    }

    match router.handle(request, &caller, None).await {
        Some(response) if response.error_code() == Some(RATE_LIMITED) => {
            let retry_after = response
                .error
                .as_ref()
                .and_then(|e| e.data.as_ref())
                .and_then(|data| data.get("retry_after_ms"))
                .and_then(Value::as_u64)
                .map_or(1, |ms| ms.div_ceil(1000).max(1));
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(response),
            )
                .into_response()
        }
        Some(response) => json_response(StatusCode::OK, response),
        None => (StatusCode::ACCEPTED, Json(json!({"status": "accepted"}))).into_response(),
    }
}

/// Answers a `tools/call` as an event stream.
///
/// The call runs on its own task. If the client goes away the task drops the
/// dispatch, which cancels the function at its next checkpoint and frees the
/// slot.
fn stream_call(router: McpRouter, request: JsonRpcRequest, caller: Caller) -> Response {
    let id = request.response_id();
    let (events, events_rx) = mpsc::unbounded_channel::<StreamEvent>();
    let _ = events.send(StreamEvent::started(id.clone()));

    tokio::spawn(async move {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressUpdate>();
        let call = router.call(id.clone(), &request.params, &caller, Some(progress_tx));
        tokio::pin!(call);

        let response = loop {
            tokio::select! {
                biased;
                Some(update) = progress_rx.recv() => {
                    let _ = events.send(progress_event(&id, update));
                }
                response = &mut call => break response,
                _ = events.closed() => {
                    debug!(%id, "Stream closed by client");
                    return;
                }
            }
        };

        while let Ok(update) = progress_rx.try_recv() {
            let _ = events.send(progress_event(&id, update));
        }
        let _ = events.send(StreamEvent::Result(response));
    });

    let stream = futures::stream::unfold(events_rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = Event::default()
            .event(event.name())
            .json_data(event.data())
            .ok()?;
        Some((Ok::<_, Infallible>(sse), rx))
    });
    Sse::new(stream).into_response()
}

fn progress_event(id: &Value, update: ProgressUpdate) -> StreamEvent {
    StreamEvent::Progress {
        id: id.clone(),
        progress: update.progress,
        total: update.total,
        message: update.message,
    }
}
