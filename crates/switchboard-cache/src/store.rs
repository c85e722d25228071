use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

/// TTL + LRU store of response bodies keyed by canonical request hash.
///
/// Cloning is cheap; clones share the same store. Individual operations
/// are atomic under one lock, held only for map access.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
    capacity: usize,
}

/// Point-in-time cache statistics for the health surface.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("capacity is at least 1"),
            ))),
            ttl,
            capacity,
        }
    }

    /// Returns the cached response for `key` if present and unexpired.
    /// Expired entries are removed on the way out.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut cache = match self.inner.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };

        let hit = match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        };

        let result = if hit.is_some() { "hit" } else { "miss" };
        counter!("gateway_cache_requests_total", "result" => result).increment(1);
        hit
    }

    /// Stores `value` under `key`, evicting the least recently used entry
    /// at capacity.
    pub fn set(&self, key: String, value: Value) {
        let mut cache = match self.inner.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.put(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let cache = match self.inner.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        CacheStats {
            size: cache.len(),
            max_size: self.capacity,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
