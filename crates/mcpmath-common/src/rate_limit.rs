//! Rate Limiting
//!
//! Optional per-caller throttling of function calls. A caller is whatever key
//! the transport uses to tell clients apart: the peer IP address for HTTP, the
//! session for the local channel.
//!
//! # Architecture
//!
//! - **Token bucket** per caller: bursts up to `burst_size`, sustained rate of
//!   `requests_per_second`
//! - Idle buckets are dropped after `entry_ttl` so memory stays bounded
//! - Only `tools/call` consumes tokens; listing and lifecycle methods are free
//!
//! # Example
//!
//! ```
//! use mcpmath_common::rate_limit::{Rate, RateLimitConfig, RateLimiter};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let rate: Rate = "2/s".parse().unwrap();
//! let limiter: RateLimiter<&str> = RateLimiter::new(RateLimitConfig::from_rate(rate));
//!
//! // Burst of 2x the rate
//! for _ in 0..4 {
//!     assert!(limiter.check("client-a").await.is_allowed());
//! }
//! assert!(!limiter.check("client-a").await.is_allowed());
//! # });
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A request rate, normalised to requests per second.
///
/// Parses `N/s`, `N/sec`, `N/m`, `N/min` or a bare `N` (per second).
/// Serialises back to the `N/s` form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RateRepr", into = "String")]
pub struct Rate {
    per_second: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RateRepr {
    PerSecond(f64),
    Text(String),
}

/// Slowest accepted rate: one request per hour.
pub const MIN_REQUESTS_PER_SECOND: f64 = 1.0 / 3600.0;

impl Rate {
    pub fn per_second(rps: f64) -> Self {
        Self { per_second: rps }
    }

    pub fn per_minute(rpm: f64) -> Self {
        Self {
            per_second: rpm / 60.0,
        }
    }

    pub fn requests_per_second(&self) -> f64 {
        self.per_second
    }

    /// Checks the rate lies between one request per hour and infinity.
    pub fn validate(&self) -> Result<(), String> {
        if !self.per_second.is_finite() || self.per_second <= 0.0 {
            return Err(format!(
                "rate must be greater than zero (got {}/s)",
                self.per_second
            ));
        }
        if self.per_second < MIN_REQUESTS_PER_SECOND {
            return Err(format!(
                "rate must be at least one request per hour (got {}/s)",
                self.per_second
            ));
        }
        Ok(())
    }

    fn checked(self) -> Result<Self, String> {
        self.validate().map(|()| self)
    }
}

impl FromStr for Rate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (count, unit) = match s.split_once('/') {
            Some((count, unit)) => (count.trim(), unit.trim().to_ascii_lowercase()),
            None => (s, "s".to_string()),
        };
        let count: f64 = count
            .parse()
            .map_err(|_| format!("invalid rate '{}': expected N, N/s or N/min", s))?;
        let rate = match unit.as_str() {
            "s" | "sec" | "second" => Self::per_second(count),
            "m" | "min" | "minute" => Self::per_minute(count),
            other => return Err(format!("unknown rate unit '{}'", other)),
        };
        rate.checked()
    }
}

impl TryFrom<RateRepr> for Rate {
    type Error = String;

    fn try_from(repr: RateRepr) -> Result<Self, Self::Error> {
        match repr {
            RateRepr::PerSecond(rps) => Self::per_second(rps).checked(),
            RateRepr::Text(text) => text.parse(),
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/s", self.per_second)
    }
}

impl From<Rate> for String {
    fn from(rate: Rate) -> Self {
        rate.to_string()
    }
}

/// Token bucket parameters.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum sustained request rate (requests per second)
    pub requests_per_second: f64,
    /// Maximum burst size (number of tokens)
    pub burst_size: u32,
    /// Interval for cleaning up idle buckets
    pub cleanup_interval: Duration,
    /// How long an idle bucket is kept
    pub entry_ttl: Duration,
}

impl RateLimitConfig {
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size: burst_size.max(1),
            cleanup_interval: Duration::from_secs(60),
            entry_ttl: Duration::from_secs(300),
        }
    }

    /// Burst size is twice the sustained rate.
    pub fn from_rate(rate: Rate) -> Self {
        let rps = rate.requests_per_second();
        Self::new(rps, (rps * 2.0).ceil() as u32)
    }
}

/// Result of a rate limit check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    RateLimited {
        /// Time until the next token is available
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Allowed => None,
            Self::RateLimited { retry_after } => Some(*retry_after),
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn full(burst_size: u32, now: Instant) -> Self {
        Self {
            tokens: burst_size as f64,
            last_update: now,
        }
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * config.requests_per_second).min(config.burst_size as f64);
        self.last_update = now;
    }

    fn try_take(&mut self, config: &RateLimitConfig, now: Instant) -> RateLimitResult {
        self.refill(config, now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateLimitResult::Allowed
        } else {
            let missing = 1.0 - self.tokens;
            RateLimitResult::RateLimited {
                retry_after: Duration::try_from_secs_f64(missing / config.requests_per_second)
                    .unwrap_or(Duration::MAX),
            }
        }
    }
}

struct Buckets<K> {
    by_key: HashMap<K, TokenBucket>,
    last_cleanup: Instant,
}

/// Token-bucket limiter keyed by caller.
///
/// Cloning yields another handle to the same buckets.
#[derive(Clone)]
pub struct RateLimiter<K> {
    config: RateLimitConfig,
    buckets: Arc<Mutex<Buckets<K>>>,
}

impl<K> RateLimiter<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(Buckets {
                by_key: HashMap::new(),
                last_cleanup: Instant::now(),
            })),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Takes one token from `key`'s bucket.
    pub async fn check(&self, key: K) -> RateLimitResult {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: K, now: Instant) -> RateLimitResult {
        let mut buckets = self.buckets.lock().await;

        if now.saturating_duration_since(buckets.last_cleanup) >= self.config.cleanup_interval {
            let ttl = self.config.entry_ttl;
            buckets
                .by_key
                .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < ttl);
            buckets.last_cleanup = now;
        }

        buckets
            .by_key
            .entry(key)
            .or_insert_with(|| TokenBucket::full(self.config.burst_size, now))
            .try_take(&self.config, now)
    }

    /// Number of callers currently tracked.
    pub async fn tracked_count(&self) -> usize {
        self.buckets.lock().await.by_key.len()
    }
}
