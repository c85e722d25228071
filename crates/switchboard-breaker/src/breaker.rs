use crate::config::BreakerConfig;
use crate::error::CircuitOpen;
use dashmap::DashMap;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Instant;
use switchboard_core::Event;

/// The three breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Events emitted by a breaker registry.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    StateTransition {
        backend: String,
        from: CircuitState,
        to: CircuitState,
    },
}

impl Event for BreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
        }
    }
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
        }
    }
}

/// Circuit breakers keyed by backend URL, created lazily on first use.
///
/// Mutations on one breaker are serialized by its entry lock; distinct
/// backends never contend.
#[derive(Clone)]
pub struct BreakerRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    config: BreakerConfig,
    breakers: DashMap<String, Breaker>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                breakers: DashMap::new(),
            }),
        }
    }

    /// Admits or rejects a call to `backend`.
    ///
    /// An open breaker past its recovery timeout transitions to half-open
    /// and admits the call as a probe.
    pub fn try_acquire(&self, backend: &str) -> Result<(), CircuitOpen> {
        let mut breaker = self.entry(backend);

        match breaker.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let recovered = breaker
                    .last_failure
                    .map(|at| at.elapsed() >= self.inner.config.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    breaker.success_count = 0;
                    self.transition(backend, &mut breaker, CircuitState::HalfOpen);
                    Ok(())
                } else {
                    Err(CircuitOpen {
                        backend: backend.to_string(),
                    })
                }
            }
        }
    }

    /// Records a successful call against `backend`.
    pub fn record_success(&self, backend: &str) {
        let mut breaker = self.entry(backend);

        match breaker.state {
            CircuitState::Closed => {
                breaker.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                breaker.success_count += 1;
                if breaker.success_count >= self.inner.config.success_threshold {
                    breaker.failure_count = 0;
                    breaker.success_count = 0;
                    self.transition(backend, &mut breaker, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed call against `backend`.
    pub fn record_failure(&self, backend: &str) {
        let mut breaker = self.entry(backend);

        breaker.failure_count = breaker.failure_count.saturating_add(1);
        breaker.last_failure = Some(Instant::now());
        counter!(
            "gateway_circuit_breaker_failures_total",
            "backend" => backend.to_string()
        )
        .increment(1);

        match breaker.state {
            CircuitState::Closed => {
                if breaker.failure_count >= self.inner.config.failure_threshold {
                    self.transition(backend, &mut breaker, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                breaker.success_count = 0;
                self.transition(backend, &mut breaker, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// The current state of `backend`'s breaker; `Closed` if none exists.
    pub fn state(&self, backend: &str) -> CircuitState {
        self.inner
            .breakers
            .get(backend)
            .map(|b| b.state)
            .unwrap_or(CircuitState::Closed)
    }

    fn entry(&self, backend: &str) -> dashmap::mapref::one::RefMut<'_, String, Breaker> {
        self.inner
            .breakers
            .entry(backend.to_string())
            .or_insert_with(Breaker::new)
    }

    fn transition(
        &self,
        backend: &str,
        breaker: &mut Breaker,
        to: CircuitState,
    ) {
        let from = breaker.state;
        if from == to {
            return;
        }
        breaker.state = to;

        gauge!("gateway_circuit_breaker_state", "backend" => backend.to_string())
            .set(to as u8 as f64);

        self.inner
            .config
            .event_listeners
            .emit(&BreakerEvent::StateTransition {
                backend: backend.to_string(),
                from,
                to,
            });
    }
}
