//! Sliding-window rate limiting keyed by tenant.
//!
//! Each tenant gets an ordered log of request timestamps. A request is
//! admitted when, after evicting timestamps older than the window, the log
//! holds fewer entries than the effective limit
//! `max(burst, floor(max_rps × window_secs))`.
//!
//! The log gives precise per-window accounting at O(limit) memory per
//! tenant; tenants are sharded so unrelated keys never contend.
//!
//! ```rust
//! use std::time::Duration;
//! use switchboard_ratelimit::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(
//!     RateLimitConfig::builder()
//!         .max_rps(2.0)
//!         .window(Duration::from_secs(1))
//!         .burst(2)
//!         .build(),
//! );
//!
//! assert!(limiter.check("10.0.0.1").is_ok());
//! assert!(limiter.check("10.0.0.1").is_ok());
//! assert!(limiter.check("10.0.0.1").is_err());
//! // A different tenant has its own window.
//! assert!(limiter.check("10.0.0.2").is_ok());
//! ```

mod config;
mod error;
mod limiter;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use error::RateLimitError;
pub use limiter::RateLimiter;
