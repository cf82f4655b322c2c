use lru::LruCache;
use std::collections::HashMap;

use mcpmath_functions::CostClass;

use super::{CacheEntry, CacheKey};

/// Decides which entry leaves a full cache.
///
/// The cache calls the hooks under its lock; implementations only keep
/// ordering state, the entries themselves belong to the cache.
pub trait EvictionPolicy: Send {
    fn on_insert(&mut self, key: &CacheKey);
    fn on_access(&mut self, key: &CacheKey);
    fn on_remove(&mut self, key: &CacheKey);
    /// Picks the entry to evict, or `None` when empty.
    fn victim(&self, entries: &HashMap<CacheKey, CacheEntry>) -> Option<CacheKey>;
    fn clear(&mut self);
}

/// Evicts the least recently inserted entry; reads do not refresh.
#[derive(Debug)]
pub struct FifoPolicy {
    order: LruCache<CacheKey, ()>,
}

impl Default for FifoPolicy {
    fn default() -> Self {
        Self {
            order: LruCache::unbounded(),
        }
    }
}

impl EvictionPolicy for FifoPolicy {
    fn on_insert(&mut self, key: &CacheKey) {
        self.order.put(key.clone(), ());
    }

    fn on_access(&mut self, _key: &CacheKey) {}

    fn on_remove(&mut self, key: &CacheKey) {
        self.order.pop(key);
    }

    fn victim(&self, _entries: &HashMap<CacheKey, CacheEntry>) -> Option<CacheKey> {
        self.order.peek_lru().map(|(key, _)| key.clone())
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

/// Least recently used with a cost bias.
///
/// Among the `window` least recently used entries the oldest cheap one is
/// evicted first; if all of them are expensive the least recently used
/// entry goes. `window == 1` is plain LRU.
#[derive(Debug)]
pub struct SmartPolicy {
    window: usize,
    recency: LruCache<CacheKey, ()>,
}

impl SmartPolicy {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            recency: LruCache::unbounded(),
        }
    }
}

impl EvictionPolicy for SmartPolicy {
    fn on_insert(&mut self, key: &CacheKey) {
        self.recency.put(key.clone(), ());
    }

    fn on_access(&mut self, key: &CacheKey) {
        self.recency.promote(key);
    }

    fn on_remove(&mut self, key: &CacheKey) {
        self.recency.pop(key);
    }

    fn victim(&self, entries: &HashMap<CacheKey, CacheEntry>) -> Option<CacheKey> {
        self.recency
            .iter()
            .rev()
            .take(self.window)
            .map(|(key, _)| key)
            .find(|key| {
                entries
                    .get(*key)
                    .is_some_and(|entry| entry.cost == CostClass::Cheap)
            })
            .or_else(|| self.recency.peek_lru().map(|(key, _)| key))
            .cloned()
    }

    fn clear(&mut self) {
        self.recency.clear();
    }
}
