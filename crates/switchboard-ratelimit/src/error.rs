use thiserror::Error;

/// Errors returned by the rate limiter.
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    /// The tenant has exhausted its window.
    #[error("rate limit exceeded: {limit} requests per window")]
    Exceeded {
        /// The effective per-window limit that was hit.
        limit: usize,
    },
}
