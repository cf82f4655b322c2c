//! Call Dispatcher
//!
//! Runs one [`CallRequest`] against an [`ExposedCatalog`] and turns every
//! outcome into a [`CallResult`].
//!
//! # Architecture
//!
//! Checks run cheapest first so that rejected calls never touch a shared
//! resource:
//! 1. unknown name → `UnknownFunction`
//! 2. argument binding → `InvalidArguments`
//! 3. cache lookup; a hit bypasses the limiter
//! 4. slot acquisition, bounded by the call deadline → `Timeout`
//! 5. execution on the blocking pool, bounded by the same deadline
//!
//! The deadline is `min(requested, computation_timeout)` measured from the
//! start of dispatch. When it passes during execution the slot is released
//! at once and the function is told to stop at its next checkpoint.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use mcpmath_common::{CallErrorKind, CallRequest, CallResult};
use mcpmath_functions::{CancelHandle, FunctionError, InvocationContext, ProgressSink};

use crate::cache::{CacheKey, ResultCache};
use crate::catalog::ExposedCatalog;
use crate::config::ServerConfig;
use crate::limiter::{AcquireError, ConcurrencyLimiter};
use crate::limits::ExecutionLimits;

/// Raises cancellation when the dispatch future finishes or is dropped.
struct CancelOnDrop(CancelHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Executes calls under the concurrency ceiling, the deadline and the cache.
pub struct Dispatcher {
    limiter: ConcurrencyLimiter,
    cache: Arc<ResultCache>,
    limits: ExecutionLimits,
}

impl Dispatcher {
    pub fn new(limiter: ConcurrencyLimiter, cache: Arc<ResultCache>, limits: ExecutionLimits) -> Self {
        Self {
            limiter,
            cache,
            limits,
        }
    }

    /// Builds the limiter, cache and limits described by `config`.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            ConcurrencyLimiter::new(config.max_concurrent_calls),
            Arc::new(ResultCache::new(
                config.cache_strategy,
                config.cache_size,
                config.smart_cache_window,
            )),
            ExecutionLimits::from_config(config),
        )
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Dispatches one call.
    ///
    /// # Arguments
    ///
    /// * `request` - The call to run
    /// * `catalog` - The functions currently exposed
    /// * `progress` - Sink for progress updates, present for streamed calls
    ///
    /// # Returns
    ///
    /// A [`CallResult`]; per-call failures never surface as `Err`.
    pub async fn dispatch(
        &self,
        request: CallRequest,
        catalog: &ExposedCatalog,
        progress: Option<ProgressSink>,
    ) -> CallResult {
        let started = Instant::now();
        let CallRequest {
            id,
            name,
            arguments,
            timeout,
        } = request;

        let Some(descriptor) = catalog.get(&name).cloned() else {
            debug!(function = %name, "Rejected call to unknown function");
            return CallResult::failure(
                id,
                CallErrorKind::UnknownFunction,
                format!("Unknown function: {}", name),
            );
        };

        let args = match descriptor.bind(&arguments) {
            Ok(args) => args,
            Err(e) => {
                debug!(function = %name, error = %e, "Rejected call with invalid arguments");
                return CallResult::failure(id, CallErrorKind::InvalidArguments, e.to_string());
            }
        };

        let key = CacheKey::new(descriptor.name(), args.canonical());
        if let Some(value) = self.cache.get(&key) {
            let elapsed = started.elapsed();
            debug!(function = %name, ?elapsed, "Served call from cache");
            return CallResult::success(id, value, elapsed, true);
        }

        let budget = self.limits.effective_timeout(timeout);
        let deadline = started + budget;

        let token = match self.limiter.acquire_until(deadline).await {
            Ok(token) => token,
            Err(AcquireError::TimedOut) => {
                warn!(function = %name, ?budget, "Call timed out waiting for an execution slot");
                return CallResult::failure(
                    id,
                    CallErrorKind::Timeout,
                    format!("Timed out after {:?} waiting for an execution slot", budget),
                );
            }
            Err(AcquireError::Closed) => {
                return CallResult::failure(
                    id,
                    CallErrorKind::ExecutionError,
                    "Server is shutting down",
                );
            }
        };

        let mut ctx = InvocationContext::new().with_deadline(deadline.into_std());
        if let Some(sink) = progress {
            ctx = ctx.with_progress(sink);
        }
        let _cancel = CancelOnDrop(ctx.cancel_handle());

        let task = {
            let descriptor = descriptor.clone();
            tokio::task::spawn_blocking(move || descriptor.invoke(&args, &ctx))
        };
        let outcome = tokio::time::timeout_at(deadline, task).await;
        drop(token);
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(Ok(value))) => {
                self.cache.put(key, value.clone(), descriptor.cost());
                debug!(function = %name, ?elapsed, "Call completed");
                CallResult::success(id, value, elapsed, false)
            }
            Err(_) | Ok(Ok(Err(FunctionError::Cancelled))) => {
                warn!(function = %name, ?budget, "Call exceeded its deadline");
                CallResult::failure(
                    id,
                    CallErrorKind::Timeout,
                    format!("Computation exceeded {:?}", budget),
                )
            }
            Ok(Ok(Err(e))) => {
                debug!(function = %name, error = %e, "Call failed");
                CallResult::failure(id, CallErrorKind::ExecutionError, e.to_string())
            }
            Ok(Err(e)) => {
                warn!(function = %name, error = %e, "Function panicked");
                CallResult::failure(
                    id,
                    CallErrorKind::ExecutionError,
                    format!("Function {} failed unexpectedly", name),
                )
            }
        }
    }
}
