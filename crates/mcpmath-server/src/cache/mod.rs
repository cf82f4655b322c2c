// Copyright 2025 mcpmath Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Result Cache
//!
//! Bounded cache of successful call results keyed by function name and the
//! canonical form of the bound arguments.
//!
//! # Strategies
//!
//! - **off**: every lookup misses, inserts are dropped
//! - **fixed**: first in, first out
//! - **smart**: least recently used, evicting cheap entries before expensive
//!   ones within a small recency window (see [`SmartPolicy`])
//!
//! Failures are never cached; callers only `put` successes.
//!
//! # Example
//!
//! ```
//! use mcpmath_functions::CostClass;
//! use mcpmath_server::cache::{CacheKey, CacheStrategy, ResultCache};
//! use serde_json::json;
//!
//! let cache = ResultCache::new(CacheStrategy::Fixed, 1, 1);
//! let key = CacheKey::new("is_prime", r#"[["n",97]]"#);
//!
//! assert!(cache.get(&key).is_none());
//! cache.put(key.clone(), json!(true), CostClass::Cheap);
//! assert_eq!(cache.get(&key), Some(json!(true)));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use mcpmath_functions::CostClass;

mod policy;

pub use policy::{EvictionPolicy, FifoPolicy, SmartPolicy};

/// Cache behaviour selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CacheStrategy {
    Off,
    Fixed,
    Smart,
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(CacheStrategy::Off),
            "fixed" | "memory" | "fifo" => Ok(CacheStrategy::Fixed),
            "smart" => Ok(CacheStrategy::Smart),
            other => Err(format!(
                "unknown cache strategy '{}' (expected off, fixed or smart)",
                other
            )),
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheStrategy::Off => "off",
            CacheStrategy::Fixed => "fixed",
            CacheStrategy::Smart => "smart",
        })
    }
}

impl TryFrom<String> for CacheStrategy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CacheStrategy> for String {
    fn from(strategy: CacheStrategy) -> Self {
        strategy.to_string()
    }
}

/// Function name plus canonical argument serialisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    function: String,
    arguments: String,
}

impl CacheKey {
    pub fn new(function: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            arguments: arguments.into(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

/// A cached success.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub cost: CostClass,
    pub inserted_at: Instant,
    pub last_access: Instant,
}

/// Counters exposed through the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub strategy: CacheStrategy,
    pub capacity: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    policy: Box<dyn EvictionPolicy>,
}

/// Thread-safe bounded result cache.
pub struct ResultCache {
    strategy: CacheStrategy,
    capacity: usize,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Creates a cache. `smart_window` only matters for the smart strategy.
    pub fn new(strategy: CacheStrategy, capacity: usize, smart_window: usize) -> Self {
        let policy: Box<dyn EvictionPolicy> = match strategy {
            CacheStrategy::Smart => Box::new(SmartPolicy::new(smart_window)),
            CacheStrategy::Off | CacheStrategy::Fixed => Box::new(FifoPolicy::default()),
        };
        Self {
            strategy,
            capacity,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                policy,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    pub fn is_enabled(&self) -> bool {
        self.strategy != CacheStrategy::Off && self.capacity > 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Looks up a result without computing anything.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        if !self.is_enabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let mut state = self.lock();
        let state = &mut *state;
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = Instant::now();
                let value = entry.value.clone();
                state.policy.on_access(key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores a success, evicting as the strategy dictates.
    pub fn put(&self, key: CacheKey, value: Value, cost: CostClass) {
        if !self.is_enabled() {
            return;
        }
        let mut state = self.lock();
        let state = &mut *state;

        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.capacity {
                let Some(victim) = state.policy.victim(&state.entries) else {
                    break;
                };
                state.entries.remove(&victim);
                state.policy.on_remove(&victim);
            }
        }

        let now = Instant::now();
        state.policy.on_insert(&key);
        state.entries.insert(
            key,
            CacheEntry {
                value,
                cost,
                inserted_at: now,
                last_access: now,
            },
        );
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.policy.clear();
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            strategy: self.strategy,
            capacity: self.capacity,
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
