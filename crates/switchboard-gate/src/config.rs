//! Configuration for the concurrency gate.

use crate::gate::GateEvent;
use std::time::Duration;
use switchboard_core::{EventListeners, FnListener};

/// Configuration for a [`ConcurrencyGate`](crate::ConcurrencyGate).
#[derive(Clone)]
pub struct GateConfig {
    pub(crate) max_inflight: usize,
    pub(crate) queue_timeout: Duration,
    pub(crate) idle_after: Duration,
    pub(crate) gc_every: u64,
    pub(crate) event_listeners: EventListeners<GateEvent>,
}

impl GateConfig {
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::new()
    }
}

/// Builder for [`GateConfig`].
pub struct GateConfigBuilder {
    max_inflight: usize,
    queue_timeout: Duration,
    idle_after: Duration,
    gc_every: u64,
    event_listeners: EventListeners<GateEvent>,
}

impl GateConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_inflight: 120,
            queue_timeout: Duration::from_secs(2),
            idle_after: Duration::from_secs(900),
            gc_every: 1000,
            event_listeners: EventListeners::new(),
        }
    }

    /// Maximum in-flight requests per tenant.
    ///
    /// Default: 120
    pub fn max_inflight(mut self, max: usize) -> Self {
        self.max_inflight = max;
        self
    }

    /// How long an admission may wait for a slot before rejection.
    ///
    /// Default: 2s
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    /// Idle time after which a tenant's gate state is eligible for GC.
    ///
    /// Default: 900s
    pub fn idle_after(mut self, idle: Duration) -> Self {
        self.idle_after = idle;
        self
    }

    /// Sweep cadence, counted in admissions.
    ///
    /// Default: 1000
    pub fn gc_every(mut self, admissions: u64) -> Self {
        self.gc_every = admissions.max(1);
        self
    }

    /// Registers a callback invoked with each tenant key pruned by a GC
    /// sweep. Use it to drop sibling per-tenant state in the same pass.
    pub fn on_tenant_evicted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            let GateEvent::TenantEvicted { tenant } = event;
            f(tenant);
        }));
        self
    }

    pub fn build(self) -> GateConfig {
        GateConfig {
            max_inflight: self.max_inflight,
            queue_timeout: self.queue_timeout,
            idle_after: self.idle_after,
            gc_every: self.gc_every,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for GateConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
