use crate::config::RateLimitConfig;
use crate::error::RateLimitError;
use dashmap::DashMap;
use metrics::counter;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Per-tenant sliding-log rate limiter.
///
/// Cloning is cheap; clones share the same windows.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    config: RateLimitConfig,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                windows: DashMap::new(),
            }),
        }
    }

    /// Admits or rejects one request for `tenant` at the current instant.
    ///
    /// Expired entries are evicted before the size check, so the window
    /// never over-counts. An admitted request is recorded immediately.
    pub fn check(&self, tenant: &str) -> Result<(), RateLimitError> {
        self.check_at(tenant, Instant::now())
    }

    fn check_at(&self, tenant: &str, now: Instant) -> Result<(), RateLimitError> {
        let limit = self.inner.config.limit();
        let mut window = self
            .inner
            .windows
            .entry(tenant.to_string())
            .or_insert_with(|| VecDeque::with_capacity(limit.min(1024)));

        while let Some(front) = window.front() {
            if now.duration_since(*front) > self.inner.config.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= limit {
            counter!(
                "gateway_rate_limit_rejections_total",
                "tenant" => tenant.to_string(),
                "reason" => "rps_exceeded"
            )
            .increment(1);
            return Err(RateLimitError::Exceeded { limit });
        }

        window.push_back(now);
        Ok(())
    }

    /// The effective per-window limit (exposed for `X-RateLimit-Limit`).
    pub fn limit(&self) -> usize {
        self.inner.config.limit()
    }

    /// Drops a tenant's window. Called when the tenant is garbage-collected.
    pub fn forget(&self, tenant: &str) {
        self.inner.windows.remove(tenant);
    }

    /// Number of tenants currently tracked.
    pub fn tracked_tenants(&self) -> usize {
        self.inner.windows.len()
    }
}
