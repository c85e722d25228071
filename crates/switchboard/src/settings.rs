//! Gateway configuration.
//!
//! Every knob is a CLI flag with an environment-variable fallback, so the
//! container image needs nothing beyond its environment. Missing required
//! values (keys, backends) abort startup before a socket is bound.

use clap::Parser;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "switchboard",
    version,
    about = "Multi-tenant admission gateway for LLM inference backends"
)]
pub struct Settings {
    /// Bearer token clients must present to the gateway.
    #[arg(long, env = "GATEWAY_API_KEY", hide_env_values = true)]
    pub gateway_api_key: String,

    /// Bearer token the gateway presents to backends.
    #[arg(long, env = "BACKEND_API_KEY", hide_env_values = true)]
    pub backend_api_key: String,

    /// Chat backend base URLs, comma separated; load-balanced round-robin.
    #[arg(long, env = "CHAT_BACKENDS", value_delimiter = ',', required = true)]
    pub chat_backends: Vec<String>,

    /// Text2SQL backend base URL.
    #[arg(long, env = "TEXT2SQL_BACKEND")]
    pub text2sql_backend: String,

    /// Embedding backend base URL.
    #[arg(long, env = "EMBED_BACKEND")]
    pub embed_backend: String,

    /// Rerank backend base URL.
    #[arg(long, env = "RERANK_BACKEND")]
    pub rerank_backend: String,

    /// Listen address.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    // Rate limiting
    #[arg(long, env = "MAX_RPS_PER_IP", default_value_t = 50.0)]
    pub max_rps_per_ip: f64,
    #[arg(long, env = "RPS_WINDOW_SECS", default_value_t = 1.0)]
    pub rps_window_secs: f64,
    #[arg(long, env = "RPS_BURST", default_value_t = 100)]
    pub rps_burst: usize,

    // Concurrency control
    #[arg(long, env = "MAX_INFLIGHT_PER_IP", default_value_t = 120)]
    pub max_inflight_per_ip: usize,
    #[arg(long, env = "QUEUE_TIMEOUT_SECS", default_value_t = 2.0)]
    pub queue_timeout_secs: f64,
    #[arg(long, env = "IP_IDLE_SECS", default_value_t = 900.0)]
    pub ip_idle_secs: f64,
    #[arg(long, env = "GC_EVERY", default_value_t = 1000)]
    pub gc_every: u64,

    // Request timeouts
    #[arg(long, env = "MAX_REQUEST_SECS", default_value_t = 5400.0)]
    pub max_request_secs: f64,
    #[arg(long, env = "STREAM_IDLE_TIMEOUT_SECS", default_value_t = 180.0)]
    pub stream_idle_timeout_secs: f64,

    // Quotas
    #[arg(long, env = "ORG_DAILY_TOKEN_LIMIT", default_value_t = 10_000_000)]
    pub org_daily_token_limit: u64,
    #[arg(long, env = "ORG_DAILY_REQUEST_LIMIT", default_value_t = 100_000)]
    pub org_daily_request_limit: u64,
    #[arg(long, env = "ORG_MONTHLY_TOKEN_LIMIT", default_value_t = 300_000_000)]
    pub org_monthly_token_limit: u64,

    // Response cache
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 60)]
    pub cache_ttl_secs: u64,
    #[arg(long, env = "CACHE_MAX_SIZE", default_value_t = 10_000)]
    pub cache_max_size: usize,

    // Circuit breaker
    #[arg(long, env = "CIRCUIT_FAILURE_THRESHOLD", default_value_t = 5)]
    pub circuit_failure_threshold: u32,
    #[arg(long, env = "CIRCUIT_RECOVERY_TIMEOUT", default_value_t = 30.0)]
    pub circuit_recovery_timeout_secs: f64,

    // Health checks
    #[arg(long, env = "HEALTH_CHECK_INTERVAL_SECS", default_value_t = 10.0)]
    pub health_check_interval_secs: f64,
    #[arg(long, env = "HEALTH_CHECK_TIMEOUT_SECS", default_value_t = 2.0)]
    pub health_check_timeout_secs: f64,

    // Logging
    #[arg(
        long,
        env = "ENABLE_PII_REDACTION",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enable_pii_redaction: bool,

    /// Tokio worker threads.
    #[arg(long, env = "GATEWAY_WORKERS", default_value_t = 4)]
    pub gateway_workers: usize,
}

/// Configuration rejected after parsing.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("GATEWAY_API_KEY and BACKEND_API_KEY must be set")]
    MissingKeys,
    #[error("{0} must be set to a non-empty backend URL")]
    MissingBackend(&'static str),
}

impl Settings {
    /// Rejects configurations clap cannot catch, such as env vars set to
    /// empty strings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.gateway_api_key.trim().is_empty() || self.backend_api_key.trim().is_empty() {
            return Err(SettingsError::MissingKeys);
        }
        if self.chat_backends.iter().all(|b| b.trim().is_empty()) {
            return Err(SettingsError::MissingBackend("CHAT_BACKENDS"));
        }
        if self.text2sql_backend.trim().is_empty() {
            return Err(SettingsError::MissingBackend("TEXT2SQL_BACKEND"));
        }
        if self.embed_backend.trim().is_empty() {
            return Err(SettingsError::MissingBackend("EMBED_BACKEND"));
        }
        if self.rerank_backend.trim().is_empty() {
            return Err(SettingsError::MissingBackend("RERANK_BACKEND"));
        }
        Ok(())
    }

    /// Chat backends with surrounding whitespace and trailing slashes
    /// normalized away.
    pub fn chat_backend_urls(&self) -> Vec<String> {
        self.chat_backends
            .iter()
            .map(|b| normalize_url(b))
            .filter(|b| !b.is_empty())
            .collect()
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.queue_timeout_secs)
    }

    pub fn rps_window(&self) -> Duration {
        Duration::from_secs_f64(self.rps_window_secs)
    }

    pub fn ip_idle(&self) -> Duration {
        Duration::from_secs_f64(self.ip_idle_secs)
    }

    pub fn max_request(&self) -> Duration {
        Duration::from_secs_f64(self.max_request_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stream_idle_timeout_secs)
    }

    pub fn circuit_recovery_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.circuit_recovery_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_interval_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_timeout_secs)
    }
}

pub(crate) fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
