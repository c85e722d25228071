//! Shared plumbing for the switchboard component crates.
//!
//! Each component (breaker, gate, …) emits typed events through an
//! [`EventListeners`] collection so the service crate can bridge component
//! activity into its own logging without the components depending on a
//! logging framework.

pub mod events;

pub use events::{Event, EventListener, EventListeners, FnListener};
