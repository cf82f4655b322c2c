//! mcpmath Server
//!
//! Configuration resolution, catalog filtering, call dispatch and both
//! transports of the mcpmath server.
//!
//! # Architecture
//!
//! ```text
//! ConfigSources ──resolve──▶ ServerConfig ──CatalogFilter──▶ ExposedCatalog
//!                                                               │
//!   stdio / HTTP ──▶ McpRouter ──▶ Dispatcher ──▶ FunctionDescriptor
//!                                  │        │
//!                       ConcurrencyLimiter  ResultCache
//! ```
//!
//! - **config**: layered configuration (file, environment, command line)
//! - **catalog**: whitelist/blacklist filtering of the function catalog
//! - **cache**: bounded result cache with `off`, `fixed` and `smart` strategies
//! - **dispatcher**: deadline, concurrency ceiling and cache around each call
//! - **router**: JSON-RPC method surface shared by both transports
//! - **stdio** / **http_server**: the local channel and the HTTP endpoint
//!
//! # Example
//!
//! ```
//! use mcpmath_common::CallRequest;
//! use mcpmath_functions::Catalog;
//! use mcpmath_server::config::{resolve, ConfigSources};
//! use mcpmath_server::McpMathServer;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let catalog = Catalog::standard().unwrap();
//! let config = resolve(&ConfigSources::default(), &catalog).unwrap();
//! let server = McpMathServer::new(config, catalog);
//!
//! let request = CallRequest::new("gcd")
//!     .with_argument("a", json!(12))
//!     .with_argument("b", json!(18));
//! let result = server.dispatcher().dispatch(request, &server.catalog(), None).await;
//! assert_eq!(result.value(), Some(&json!(6)));
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod http_server;
pub mod limiter;
pub mod limits;
pub mod router;
pub mod server;
pub mod stdio;

pub use cache::{CacheKey, CacheStats, CacheStrategy, ResultCache};
pub use catalog::{CatalogFilter, ExposedCatalog, FilterStats};
pub use config::{ConfigError, ServerConfig, TransportKind};
pub use dispatcher::Dispatcher;
pub use http_server::HttpServer;
pub use limiter::{AcquireError, ConcurrencyLimiter, InFlightToken};
pub use limits::ExecutionLimits;
pub use router::{Caller, McpRouter};
pub use server::{McpMathServer, Snapshot};
pub use stdio::{run_stdio, serve_lines};
