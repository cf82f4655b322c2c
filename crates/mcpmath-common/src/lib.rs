//! mcpmath Common Types
//!
//! Protocol definitions and shared infrastructure for the mcpmath server.
//!
//! # Overview
//!
//! mcpmath exposes a catalog of math functions to protocol clients over two
//! transports: a line-oriented local channel (stdin/stdout) and an HTTP
//! endpoint that can stream progress with server-sent events. Everything both
//! transports agree on lives here:
//!
//! - **Protocol Layer**: JSON-RPC 2.0 envelope, the MCP method subset,
//!   call requests/results, the per-call error taxonomy and stream events
//! - **Transport Layer**: line framing for the local channel
//! - **Rate Limiting**: token buckets keyed by caller
//!
//! # Example
//!
//! ```
//! use mcpmath_common::{CallRequest, CallResult, CallErrorKind};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let request = CallRequest::new("is_prime")
//!     .with_id(json!(7))
//!     .with_argument("n", json!(97));
//!
//! let result = CallResult::success(request.id.clone(), json!(true), Duration::from_millis(2), false);
//! assert!(result.is_success());
//!
//! let failure = CallResult::failure(json!(7), CallErrorKind::Timeout, "deadline exceeded");
//! assert_eq!(failure.kind(), Some(CallErrorKind::Timeout));
//! ```

pub mod protocol;
pub mod rate_limit;
pub mod transport;

pub use protocol::*;
