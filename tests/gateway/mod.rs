//! Gateway scenario tests.
//!
//! Test organization:
//! - admission.rs: auth, rate limiting, queue timeouts
//! - streaming.rs: SSE reframing, pre-stream errors, idle timeout
//! - breaker.rs: circuit trip, recovery, re-close
//! - routing.rs: round-robin, health surface, passthrough, headers
//! - quota.rs: quota denial, cache accounting, admin endpoints


mod breaker;
mod quota;
mod routing;
mod streaming;
