//! Configuration for the breaker registry.

use crate::breaker::{BreakerEvent, CircuitState};
use std::time::Duration;
use switchboard_core::{EventListeners, FnListener};

/// Configuration shared by every breaker in a registry.
#[derive(Clone)]
pub struct BreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) recovery_timeout: Duration,
    pub(crate) success_threshold: u32,
    pub(crate) event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfig {
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }
}

/// Builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder {
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
    event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 3,
            event_listeners: EventListeners::new(),
        }
    }

    /// Consecutive failures that trip a closed breaker open.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Time an open breaker waits before admitting a half-open probe.
    ///
    /// Default: 30s
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Consecutive half-open successes required to close the breaker.
    ///
    /// Default: 3
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Registers a callback for every state transition.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            let BreakerEvent::StateTransition { backend, from, to } = event;
            f(backend, *from, *to);
        }));
        self
    }

    pub fn build(self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: self.recovery_timeout,
            success_threshold: self.success_threshold,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
