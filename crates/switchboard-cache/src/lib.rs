//! Response caching for deterministic requests.
//!
//! Only near-deterministic requests are admitted (`temperature ≤ 0.3`,
//! non-streaming). The key is the hex SHA-256 of a canonical JSON encoding
//! of the request's semantic fields, so any reordering of body keys maps to
//! the same entry. Entries expire by TTL and are evicted LRU at capacity.

mod key;
mod store;

pub use key::cache_key;
pub use store::{CacheStats, ResponseCache};

/// Whether a request payload is eligible for caching.
///
/// Cacheable iff the sampling temperature is at most 0.3 (absent counts as
/// the backend default of 0.7) and the request is not streaming.
pub fn cacheable(payload: &serde_json::Value) -> bool {
    let temperature = payload
        .get("temperature")
        .and_then(|t| t.as_f64())
        .unwrap_or(0.7);
    let streaming = payload
        .get("stream")
        .and_then(|s| s.as_bool())
        .unwrap_or(false);
    temperature <= 0.3 && !streaming
}
