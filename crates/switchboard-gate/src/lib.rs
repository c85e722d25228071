//! Per-tenant bounded concurrency.
//!
//! Each tenant gets a semaphore of fixed capacity. Admission waits in FIFO
//! order for up to a configured queue timeout, then rejects. The returned
//! [`GatePermit`] releases the slot on drop, whatever the exit path: a
//! completed response, an error, or a client that disconnected mid-stream.
//!
//! Tenants that stay idle past a threshold are pruned opportunistically:
//! every N admissions the gate sweeps its table, and each evicted tenant is
//! reported through the [`on_tenant_evicted`](GateConfigBuilder::on_tenant_evicted)
//! hook so sibling per-tenant state (rate windows, …) can be dropped in the
//! same pass.

mod config;
mod error;
mod gate;

pub use config::{GateConfig, GateConfigBuilder};
pub use error::GateError;
pub use gate::{ConcurrencyGate, GateEvent, GatePermit};
