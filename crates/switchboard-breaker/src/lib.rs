//! Circuit breakers for backend calls, one per backend URL.
//!
//! ## States
//! - **Closed**: calls pass; a success clears the failure run, a failure
//!   extends it, and hitting the threshold trips the breaker open.
//! - **Open**: calls are rejected without touching the backend until the
//!   recovery timeout has elapsed, at which point the next call is admitted
//!   as a half-open probe.
//! - **HalfOpen**: calls pass; any failure re-opens immediately, and a run
//!   of consecutive successes closes the breaker again.
//!
//! Call sites bracket the backend operation:
//!
//! ```rust
//! use switchboard_breaker::{BreakerConfig, BreakerRegistry};
//!
//! let registry = BreakerRegistry::new(BreakerConfig::builder().build());
//! let url = "http://backend-0:8000";
//!
//! if registry.try_acquire(url).is_ok() {
//!     // ... perform the call ...
//!     registry.record_success(url);
//! }
//! ```
//!
//! Outcome recording applies against the breaker's state at recording
//! time, under the breaker's lock, so a probe that outlives a concurrent
//! transition still lands with the right semantics.

mod breaker;
mod config;
mod error;

pub use breaker::{BreakerEvent, BreakerRegistry, CircuitState};
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use error::CircuitOpen;
