//! Backend dispatch: the one-shot JSON path and the SSE streaming path,
//! both gated by the per-backend circuit breakers.

pub mod json;
pub mod sse;
pub mod transform;
