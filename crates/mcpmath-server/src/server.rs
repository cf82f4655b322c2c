use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::info;

use mcpmath_common::protocol::events::unix_millis;
use mcpmath_common::protocol::mcp::ServerInfo;
use mcpmath_common::rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
use mcpmath_common::Result;
use mcpmath_functions::Catalog;

use crate::catalog::{CatalogFilter, ExposedCatalog};
use crate::config::{check_filter_targets, ConfigError, ServerConfig, TransportKind};
use crate::dispatcher::Dispatcher;
use crate::http_server::HttpServer;
use crate::router::{Caller, McpRouter};

/// Configuration and exposed catalog published together.
///
/// Readers clone the `Arc`s and keep using them; a reconfiguration never
/// changes a snapshot already handed out.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub config: Arc<ServerConfig>,
    pub catalog: Arc<ExposedCatalog>,
}

/// mcpmath server - owns the catalog, the dispatcher and the rate limiter.
///
/// Transport, concurrency ceiling, cache, timeout and rate are fixed when the
/// server is built. [`reconfigure`](Self::reconfigure) republishes the
/// filtering and descriptive settings only.
pub struct McpMathServer {
    full_catalog: Catalog,
    snapshot: RwLock<Snapshot>,
    dispatcher: Dispatcher,
    rate_limiter: Option<RateLimiter<Caller>>,
}

impl McpMathServer {
    /// Creates a server from a resolved configuration.
    ///
    /// # Arguments
    /// * `config` - Output of [`resolve`](crate::config::resolve)
    /// * `catalog` - The full function catalog
    pub fn new(config: ServerConfig, catalog: Catalog) -> Self {
        let exposed = CatalogFilter::from_config(&config).apply(&catalog);
        let stats = exposed.stats();
        info!(
            total_available = stats.total_available,
            total_exposed = stats.total_exposed,
            filtering_active = stats.filtering_active,
            domains = ?exposed.domains(),
            "Catalog filtered"
        );

        let dispatcher = Dispatcher::from_config(&config);
        let rate_limiter = config
            .rate_limit
            .map(|rate| RateLimiter::new(RateLimitConfig::from_rate(rate)));

        Self {
            full_catalog: catalog,
            snapshot: RwLock::new(Snapshot {
                config: Arc::new(config),
                catalog: Arc::new(exposed),
            }),
            dispatcher,
            rate_limiter,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The current configuration and exposed catalog.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.read().config.clone()
    }

    pub fn catalog(&self) -> Arc<ExposedCatalog> {
        self.read().catalog.clone()
    }

    pub fn full_catalog(&self) -> &Catalog {
        &self.full_catalog
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Re-runs filtering with `config` and publishes the result atomically.
    ///
    /// Calls already dispatched keep the snapshot they started with.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when `config` fails validation or a filter
    /// list names nothing in the catalog; the current snapshot stays in place.
    pub fn reconfigure(&self, config: ServerConfig) -> std::result::Result<(), ConfigError> {
        config.validate()?;
        check_filter_targets(&config, &self.full_catalog)?;
        let exposed = CatalogFilter::from_config(&config).apply(&self.full_catalog);
        info!(
            total_exposed = exposed.len(),
            filtering_active = exposed.stats().filtering_active,
            "Publishing new catalog"
        );

        let next = Snapshot {
            config: Arc::new(config),
            catalog: Arc::new(exposed),
        };
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
        Ok(())
    }

    /// Takes one token for `caller`; always allowed without a configured rate.
    pub async fn check_rate(&self, caller: &Caller) -> RateLimitResult {
        match &self.rate_limiter {
            Some(limiter) => limiter.check(caller.clone()).await,
            None => RateLimitResult::Allowed,
        }
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.config().server_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Healthy while something is exposed and the limiter hands out slots.
    pub fn is_healthy(&self) -> bool {
        !self.catalog().is_empty() && self.dispatcher.limiter().is_responsive()
    }

    /// Payload of the status endpoint.
    pub fn status(&self) -> Value {
        let Snapshot { config, catalog } = self.snapshot();
        json!({
            "server": config.server_name,
            "version": env!("CARGO_PKG_VERSION"),
            "description": config.server_description,
            "transport": config.transport,
            "functions_available": catalog.len(),
            "domains": catalog.domains(),
            "filtering": catalog.stats(),
        })
    }

    /// Payload of the health endpoint.
    pub fn health(&self) -> Value {
        let healthy = self.is_healthy();
        let limiter = self.dispatcher.limiter();
        json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "healthy": healthy,
            "timestamp": unix_millis(),
            "functions": self.catalog().len(),
            "in_flight": limiter.in_flight(),
            "available_slots": limiter.available(),
            "cache": self.dispatcher.cache().stats(),
        })
    }

    /// Stops handing out execution slots.
    ///
    /// Calls still waiting for a slot fail, and health reports unhealthy
    /// while open connections drain.
    pub fn shutdown(&self) {
        info!("Closing execution slots");
        self.dispatcher.limiter().close();
    }

    /// Runs the configured transport until it finishes or `signal` resolves.
    ///
    /// The local channel also returns when stdin closes. When `signal`
    /// fires the server is [shut down](Self::shutdown) first; HTTP then
    /// drains open connections before returning.
    pub async fn run_until<F>(self: Arc<Self>, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let config = self.config();
        let shutdown = {
            let server = self.clone();
            async move {
                signal.await;
                server.shutdown();
            }
        };

        match config.transport {
            TransportKind::Local => {
                info!("Serving on the local channel");
                tokio::select! {
                    result = crate::stdio::run_stdio(McpRouter::new(self)) => result,
                    _ = shutdown => Ok(()),
                }
            }
            TransportKind::Http => {
                HttpServer::new(self)
                    .run_until(&config.bind_address(), shutdown)
                    .await
            }
        }
    }
}
