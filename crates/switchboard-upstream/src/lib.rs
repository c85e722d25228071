//! Backend health monitoring and selection.
//!
//! A background loop probes every configured backend's `/health` endpoint
//! and publishes the set of healthy URLs per role as one atomic snapshot:
//! readers always see either the previous or the new complete set, never a
//! partial update, and take a single snapshot per request.
//!
//! Selection is round-robin over the currently healthy chat backends
//! (driven by a caller-supplied monotonic counter) and first-healthy for
//! the single-backend roles.

mod monitor;
mod role;

pub use monitor::{HealthMonitor, HealthSnapshot, MonitorConfig, UpstreamSet};
pub use role::Role;

use thiserror::Error;

/// No healthy backend is available for the requested role.
#[derive(Debug, Clone, Error)]
#[error("no healthy {role} backend available")]
pub struct NoHealthyBackend {
    pub role: Role,
}
