use crate::role::Role;
use crate::NoHealthyBackend;
use arc_swap::ArcSwap;
use futures::future::join_all;
use metrics::gauge;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The configured backends, one URL list per role. Only the chat role is
/// load-balanced; the other roles run a single backend.
#[derive(Debug, Clone)]
pub struct UpstreamSet {
    pub chat: Vec<String>,
    pub text2sql: String,
    pub embed: String,
    pub rerank: String,
}

impl UpstreamSet {
    fn configured(&self, role: Role) -> Vec<String> {
        match role {
            Role::Chat => self.chat.clone(),
            Role::Text2Sql => vec![self.text2sql.clone()],
            Role::Embed => vec![self.embed.clone()],
            Role::Rerank => vec![self.rerank.clone()],
        }
    }
}

/// Probe-loop tuning.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between probe rounds. Default: 10s.
    pub interval: Duration,
    /// Per-probe timeout. Default: 2s.
    pub timeout: Duration,
    /// Bearer token sent to backend `/health` endpoints.
    pub backend_token: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(2),
            backend_token: String::new(),
        }
    }
}

/// The healthy backends at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub chat: Vec<String>,
    pub text2sql: Vec<String>,
    pub embed: Vec<String>,
    pub rerank: Vec<String>,
    /// When this snapshot was published, seconds since the Unix epoch.
    /// Zero only for the boot snapshot, before the first probe.
    pub checked_at: u64,
}

impl HealthSnapshot {
    fn empty() -> Self {
        Self {
            chat: Vec::new(),
            text2sql: Vec::new(),
            embed: Vec::new(),
            rerank: Vec::new(),
            checked_at: 0,
        }
    }

    pub fn healthy(&self, role: Role) -> &[String] {
        match role {
            Role::Chat => &self.chat,
            Role::Text2Sql => &self.text2sql,
            Role::Embed => &self.embed,
            Role::Rerank => &self.rerank,
        }
    }

    /// Selects a backend for `role`.
    ///
    /// Chat reduces the caller's monotonic counter modulo the *currently*
    /// healthy count; single-backend roles return their only healthy URL.
    pub fn select(&self, role: Role, counter: u64) -> Result<String, NoHealthyBackend> {
        let healthy = self.healthy(role);
        if healthy.is_empty() {
            return Err(NoHealthyBackend { role });
        }
        let index = match role {
            Role::Chat => (counter % healthy.len() as u64) as usize,
            _ => 0,
        };
        Ok(healthy[index].clone())
    }

    /// True when every role that has configured backends has at least one
    /// healthy backend.
    pub fn all_roles_available(&self) -> bool {
        !self.chat.is_empty()
            && !self.text2sql.is_empty()
            && !self.embed.is_empty()
            && !self.rerank.is_empty()
    }
}

/// Periodically probes every configured backend and publishes the healthy
/// set atomically.
///
/// Cloning is cheap; clones share the same snapshot and probe loop.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    config: MonitorConfig,
    upstreams: UpstreamSet,
    snapshot: ArcSwap<HealthSnapshot>,
    probe_loop: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(upstreams: UpstreamSet, config: MonitorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config,
                upstreams,
                snapshot: ArcSwap::from_pointee(HealthSnapshot::empty()),
                probe_loop: Mutex::new(None),
            }),
        })
    }

    /// The current healthy set. One load per request; the snapshot is
    /// immutable and complete.
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.inner.snapshot.load_full()
    }

    /// Probes every configured backend once and publishes a fresh snapshot.
    ///
    /// Run once before accepting traffic so the gateway never serves from
    /// the empty boot snapshot.
    pub async fn probe_all(&self) {
        let mut next = HealthSnapshot::empty();
        for role in Role::ALL {
            let configured = self.inner.upstreams.configured(role);
            let checks = join_all(
                configured
                    .iter()
                    .map(|url| self.probe_backend(url.clone(), role)),
            )
            .await;

            let healthy: Vec<String> = configured
                .into_iter()
                .zip(checks)
                .filter_map(|(url, ok)| ok.then_some(url))
                .collect();

            match role {
                Role::Chat => next.chat = healthy,
                Role::Text2Sql => next.text2sql = healthy,
                Role::Embed => next.embed = healthy,
                Role::Rerank => next.rerank = healthy,
            }
        }

        next.checked_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|since| since.as_secs())
            .unwrap_or(0);
        self.inner.snapshot.store(Arc::new(next));
    }

    async fn probe_backend(&self, url: String, role: Role) -> bool {
        let result = self
            .inner
            .client
            .get(format!("{url}/health"))
            .bearer_auth(&self.inner.config.backend_token)
            .send()
            .await;

        let healthy = match result {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(backend = %url, role = %role, %error, "health probe failed");
                false
            }
        };

        if !healthy {
            warn!(backend = %url, role = %role, "backend unhealthy");
        }
        gauge!("gateway_backend_health", "backend" => url, "role" => role.as_str())
            .set(if healthy { 1.0 } else { 0.0 });
        healthy
    }

    /// Starts the periodic probe loop. Idempotent.
    pub async fn start(&self) {
        let mut probe_loop = self.inner.probe_loop.lock().await;
        if probe_loop.is_some() {
            return;
        }

        let monitor = self.clone();
        *probe_loop = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.inner.config.interval);
            // The caller already ran the startup probe; skip the immediate tick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.probe_all().await;
            }
        }));
    }

    /// Cancels the probe loop.
    pub async fn shutdown(&self) {
        if let Some(probe_loop) = self.inner.probe_loop.lock().await.take() {
            probe_loop.abort();
        }
    }
}
