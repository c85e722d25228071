//! Configuration for the sliding-window rate limiter.

use std::time::Duration;

/// Configuration for a [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub(crate) max_rps: f64,
    pub(crate) window: Duration,
    pub(crate) burst: usize,
}

impl RateLimitConfig {
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// The effective per-window limit: `max(burst, floor(max_rps × window))`.
    pub fn limit(&self) -> usize {
        let sustained = (self.max_rps * self.window.as_secs_f64()).floor() as usize;
        self.burst.max(sustained)
    }
}

/// Builder for [`RateLimitConfig`].
pub struct RateLimitConfigBuilder {
    max_rps: f64,
    window: Duration,
    burst: usize,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_rps: 50.0,
            window: Duration::from_secs(1),
            burst: 100,
        }
    }

    /// Sustained requests per second allowed per tenant.
    ///
    /// Default: 50
    pub fn max_rps(mut self, max_rps: f64) -> Self {
        self.max_rps = max_rps;
        self
    }

    /// Length of the sliding window.
    ///
    /// Default: 1s
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Burst allowance; the effective limit never drops below this.
    ///
    /// Default: 100
    pub fn burst(mut self, burst: usize) -> Self {
        self.burst = burst;
        self
    }

    pub fn build(self) -> RateLimitConfig {
        RateLimitConfig {
            max_rps: self.max_rps,
            window: self.window,
            burst: self.burst,
        }
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
