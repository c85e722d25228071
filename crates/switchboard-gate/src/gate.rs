use crate::config::GateConfig;
use crate::error::GateError;
use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use switchboard_core::Event;

/// Events emitted by the gate.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// A tenant's state was pruned by a GC sweep.
    TenantEvicted { tenant: String },
}

impl Event for GateEvent {
    fn kind(&self) -> &'static str {
        match self {
            GateEvent::TenantEvicted { .. } => "tenant_evicted",
        }
    }
}

struct TenantGate {
    semaphore: Arc<Semaphore>,
    last_seen: Mutex<Instant>,
}

/// Per-tenant bounded concurrency gate.
///
/// Cloning is cheap; clones share the same tenant table.
#[derive(Clone)]
pub struct ConcurrencyGate {
    inner: Arc<Inner>,
}

struct Inner {
    config: GateConfig,
    tenants: DashMap<String, Arc<TenantGate>>,
    admissions: AtomicU64,
}

impl ConcurrencyGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                tenants: DashMap::new(),
                admissions: AtomicU64::new(0),
            }),
        }
    }

    /// Waits for an in-flight slot for `tenant`, FIFO, up to the queue
    /// timeout. The permit releases the slot on drop.
    pub async fn admit(&self, tenant: &str) -> Result<GatePermit, GateError> {
        let gate = self.tenant_gate(tenant);

        let admissions = self.inner.admissions.fetch_add(1, Ordering::Relaxed) + 1;
        if admissions % self.inner.config.gc_every == 0 {
            self.sweep_idle();
        }

        let queued_at = Instant::now();
        let acquired = tokio::time::timeout(
            self.inner.config.queue_timeout,
            Arc::clone(&gate.semaphore).acquire_owned(),
        )
        .await;

        match acquired {
            Ok(Ok(permit)) => {
                histogram!("gateway_queue_wait_seconds", "tenant" => tenant.to_string())
                    .record(queued_at.elapsed().as_secs_f64());
                let permit = GatePermit {
                    tenant: tenant.to_string(),
                    semaphore: Arc::clone(&gate.semaphore),
                    max_inflight: self.inner.config.max_inflight,
                    _permit: permit,
                };
                permit.publish_depth();
                Ok(permit)
            }
            // A closed semaphore only happens if the gate itself was torn
            // down; surface it the same way as a timeout.
            Ok(Err(_)) | Err(_) => {
                counter!(
                    "gateway_rate_limit_rejections_total",
                    "tenant" => tenant.to_string(),
                    "reason" => "queue_timeout"
                )
                .increment(1);
                Err(GateError::QueueTimeout {
                    max_inflight: self.inner.config.max_inflight,
                })
            }
        }
    }

    fn tenant_gate(&self, tenant: &str) -> Arc<TenantGate> {
        let gate = self
            .inner
            .tenants
            .entry(tenant.to_string())
            .or_insert_with(|| {
                Arc::new(TenantGate {
                    semaphore: Arc::new(Semaphore::new(self.inner.config.max_inflight)),
                    last_seen: Mutex::new(Instant::now()),
                })
            })
            .clone();

        if let Ok(mut last_seen) = gate.last_seen.lock() {
            *last_seen = Instant::now();
        }
        gate
    }

    /// Prunes tenants idle past the threshold. Only fully drained gates are
    /// removed; a tenant with requests still in flight is left alone so its
    /// capacity cannot be exceeded by a replacement semaphore.
    fn sweep_idle(&self) {
        let idle_after = self.inner.config.idle_after;
        let max = self.inner.config.max_inflight;
        let mut evicted = Vec::new();

        self.inner.tenants.retain(|tenant, gate| {
            let idle = gate
                .last_seen
                .lock()
                .map(|seen| seen.elapsed() > idle_after)
                .unwrap_or(false);
            let drained = gate.semaphore.available_permits() == max;
            if idle && drained {
                evicted.push(tenant.clone());
                false
            } else {
                true
            }
        });

        for tenant in evicted {
            self.inner
                .config
                .event_listeners
                .emit(&GateEvent::TenantEvicted { tenant });
        }
    }

    /// Number of tenants currently tracked.
    pub fn tracked_tenants(&self) -> usize {
        self.inner.tenants.len()
    }

    #[cfg(test)]
    pub(crate) fn force_sweep(&self) {
        self.sweep_idle();
    }
}

/// An admitted request's slot. Dropping it releases the slot and refreshes
/// the queue-depth gauge.
#[derive(Debug)]
pub struct GatePermit {
    tenant: String,
    semaphore: Arc<Semaphore>,
    max_inflight: usize,
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// The tenant this permit was issued for.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    fn publish_depth(&self) {
        let in_flight = self.max_inflight - self.semaphore.available_permits();
        gauge!("gateway_queue_depth", "tenant" => self.tenant.clone()).set(in_flight as f64);
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // The permit itself is released by its own drop; the gauge must be
        // computed as if that already happened.
        let in_flight = self
            .max_inflight
            .saturating_sub(self.semaphore.available_permits() + 1);
        gauge!("gateway_queue_depth", "tenant" => self.tenant.clone()).set(in_flight as f64);
    }
}
