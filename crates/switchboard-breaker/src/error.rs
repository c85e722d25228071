use thiserror::Error;

/// Returned when a breaker is open and the call was not admitted.
#[derive(Debug, Clone, Error)]
#[error("circuit open for backend {backend}")]
pub struct CircuitOpen {
    /// The backend URL whose breaker rejected the call.
    pub backend: String,
}
