//! The gateway's shared state, constructed once at startup and injected
//! everywhere. No free-standing globals: every registry the pipeline
//! touches hangs off this value.

use crate::settings::{normalize_url, Settings};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use switchboard_breaker::{BreakerConfig, BreakerRegistry};
use switchboard_cache::ResponseCache;
use switchboard_gate::{ConcurrencyGate, GateConfig};
use switchboard_quota::{QuotaConfig, QuotaLedger};
use switchboard_ratelimit::{RateLimitConfig, RateLimiter};
use switchboard_upstream::{HealthMonitor, MonitorConfig, UpstreamSet};
use thiserror::Error;
use tracing::info;

/// Startup failures.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct Gateway {
    pub settings: Settings,
    pub limiter: RateLimiter,
    pub gate: ConcurrencyGate,
    pub breakers: BreakerRegistry,
    pub quota: QuotaLedger,
    pub cache: ResponseCache,
    pub health: HealthMonitor,
    pub client: reqwest::Client,
    pub metrics: Option<PrometheusHandle>,
    chat_counter: AtomicU64,
}

impl Gateway {
    pub fn new(settings: Settings, metrics: Option<PrometheusHandle>) -> Result<Self, BuildError> {
        let limiter = RateLimiter::new(
            RateLimitConfig::builder()
                .max_rps(settings.max_rps_per_ip)
                .window(settings.rps_window())
                .burst(settings.rps_burst)
                .build(),
        );

        // Rate windows ride along with the gate's idle GC: a tenant whose
        // gate is pruned loses its window in the same sweep.
        let window_owner = limiter.clone();
        let gate = ConcurrencyGate::new(
            GateConfig::builder()
                .max_inflight(settings.max_inflight_per_ip)
                .queue_timeout(settings.queue_timeout())
                .idle_after(settings.ip_idle())
                .gc_every(settings.gc_every)
                .on_tenant_evicted(move |tenant| {
                    window_owner.forget(tenant);
                })
                .build(),
        );

        let breakers = BreakerRegistry::new(
            BreakerConfig::builder()
                .failure_threshold(settings.circuit_failure_threshold)
                .recovery_timeout(settings.circuit_recovery_timeout())
                .on_state_transition(|backend, from, to| {
                    info!(
                        backend,
                        from = from.as_str(),
                        to = to.as_str(),
                        "circuit_transition"
                    );
                })
                .build(),
        );

        let quota = QuotaLedger::new(
            QuotaConfig::builder()
                .daily_token_limit(settings.org_daily_token_limit)
                .daily_request_limit(settings.org_daily_request_limit)
                .monthly_token_limit(settings.org_monthly_token_limit)
                .build(),
        );

        let cache = ResponseCache::new(
            settings.cache_max_size,
            Duration::from_secs(settings.cache_ttl_secs),
        );

        let health = HealthMonitor::new(
            UpstreamSet {
                chat: settings.chat_backend_urls(),
                text2sql: normalize_url(&settings.text2sql_backend),
                embed: normalize_url(&settings.embed_backend),
                rerank: normalize_url(&settings.rerank_backend),
            },
            MonitorConfig {
                interval: settings.health_check_interval(),
                timeout: settings.health_check_timeout(),
                backend_token: settings.backend_api_key.clone(),
            },
        )?;

        // Backend connects are capped tight; totals are enforced per call
        // site (the JSON path sets a request timeout, the stream path
        // polices idleness itself).
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(64)
            .build()?;

        Ok(Self {
            settings,
            limiter,
            gate,
            breakers,
            quota,
            cache,
            health,
            client,
            metrics,
            chat_counter: AtomicU64::new(0),
        })
    }

    /// Advances the chat round-robin counter exactly once and returns the
    /// admission's index.
    pub fn next_chat_index(&self) -> u64 {
        self.chat_counter.fetch_add(1, Ordering::Relaxed)
    }
}
