use thiserror::Error;

/// Errors returned by the concurrency gate.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// No slot became available within the queue timeout.
    #[error("queue timeout: tenant at {max_inflight} in-flight requests")]
    QueueTimeout {
        /// The tenant's in-flight capacity.
        max_inflight: usize,
    },
}
