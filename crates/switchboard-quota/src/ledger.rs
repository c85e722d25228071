use crate::reset::{next_daily_reset, next_monthly_reset};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Limits applied to every tenant.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub(crate) daily_token_limit: u64,
    pub(crate) daily_request_limit: u64,
    pub(crate) monthly_token_limit: u64,
}

impl QuotaConfig {
    pub fn builder() -> QuotaConfigBuilder {
        QuotaConfigBuilder::new()
    }
}

/// Builder for [`QuotaConfig`].
pub struct QuotaConfigBuilder {
    daily_token_limit: u64,
    daily_request_limit: u64,
    monthly_token_limit: u64,
}

impl QuotaConfigBuilder {
    pub fn new() -> Self {
        Self {
            daily_token_limit: 10_000_000,
            daily_request_limit: 100_000,
            monthly_token_limit: 300_000_000,
        }
    }

    /// Default: 10,000,000
    pub fn daily_token_limit(mut self, limit: u64) -> Self {
        self.daily_token_limit = limit;
        self
    }

    /// Default: 100,000
    pub fn daily_request_limit(mut self, limit: u64) -> Self {
        self.daily_request_limit = limit;
        self
    }

    /// Default: 300,000,000
    pub fn monthly_token_limit(mut self, limit: u64) -> Self {
        self.monthly_token_limit = limit;
        self
    }

    pub fn build(self) -> QuotaConfig {
        QuotaConfig {
            daily_token_limit: self.daily_token_limit,
            daily_request_limit: self.daily_request_limit,
            monthly_token_limit: self.monthly_token_limit,
        }
    }
}

impl Default for QuotaConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Which limit a denied request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    DailyRequests,
    DailyTokens,
    MonthlyTokens,
}

impl QuotaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::DailyRequests => "daily_requests",
            QuotaKind::DailyTokens => "daily_tokens",
            QuotaKind::MonthlyTokens => "monthly_tokens",
        }
    }
}

/// A denied quota check: which limit was hit and when it resets.
#[derive(Debug, Clone, Error)]
#[error("{} limit exceeded, resets at {reset_at}", kind.as_str())]
pub struct QuotaDenial {
    pub kind: QuotaKind,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug)]
struct QuotaRecord {
    daily_tokens: u64,
    daily_requests: u64,
    monthly_tokens: u64,
    daily_reset_at: DateTime<Utc>,
    monthly_reset_at: DateTime<Utc>,
}

impl QuotaRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_tokens: 0,
            daily_requests: 0,
            monthly_tokens: 0,
            daily_reset_at: next_daily_reset(now),
            monthly_reset_at: next_monthly_reset(now),
        }
    }

    fn roll_over(&mut self, now: DateTime<Utc>) {
        if now >= self.daily_reset_at {
            self.daily_tokens = 0;
            self.daily_requests = 0;
            self.daily_reset_at = next_daily_reset(now);
        }
        if now >= self.monthly_reset_at {
            self.monthly_tokens = 0;
            self.monthly_reset_at = next_monthly_reset(now);
        }
    }
}

/// A tenant's current counters and reset boundaries.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaUsage {
    pub daily_tokens: u64,
    pub daily_requests: u64,
    pub monthly_tokens: u64,
    pub daily_limit_tokens: u64,
    pub daily_limit_requests: u64,
    pub monthly_limit_tokens: u64,
    pub daily_reset_at: String,
    pub monthly_reset_at: String,
}

/// Per-tenant quota ledger.
///
/// Cloning is cheap; clones share the same records.
#[derive(Clone)]
pub struct QuotaLedger {
    inner: Arc<Inner>,
}

struct Inner {
    config: QuotaConfig,
    records: DashMap<String, QuotaRecord>,
}

impl QuotaLedger {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                records: DashMap::new(),
            }),
        }
    }

    /// Checks whether `tenant` may spend `estimated_tokens` more tokens.
    ///
    /// The checks apply in a fixed order: daily request count, daily
    /// tokens, monthly tokens. A denial reports the limit that was hit and
    /// the boundary at which it resets.
    pub fn check(&self, tenant: &str, estimated_tokens: u64) -> Result<(), QuotaDenial> {
        self.check_at(tenant, estimated_tokens, Utc::now())
    }

    fn check_at(
        &self,
        tenant: &str,
        estimated_tokens: u64,
        now: DateTime<Utc>,
    ) -> Result<(), QuotaDenial> {
        let config = &self.inner.config;
        let mut record = self.entry(tenant, now);
        record.roll_over(now);

        let denial = if record.daily_requests >= config.daily_request_limit {
            Some((QuotaKind::DailyRequests, record.daily_reset_at))
        } else if record.daily_tokens + estimated_tokens > config.daily_token_limit {
            Some((QuotaKind::DailyTokens, record.daily_reset_at))
        } else if record.monthly_tokens + estimated_tokens > config.monthly_token_limit {
            Some((QuotaKind::MonthlyTokens, record.monthly_reset_at))
        } else {
            None
        };

        match denial {
            Some((kind, reset_at)) => {
                counter!(
                    "gateway_quota_exceeded_total",
                    "tenant" => tenant.to_string(),
                    "kind" => kind.as_str()
                )
                .increment(1);
                Err(QuotaDenial { kind, reset_at })
            }
            None => Ok(()),
        }
    }

    /// Records `tokens` spent by `tenant` and one completed request.
    ///
    /// Cache hits record zero tokens; the request still counts.
    pub fn record(&self, tenant: &str, tokens: u64) {
        self.record_at(tenant, tokens, Utc::now());
    }

    fn record_at(&self, tenant: &str, tokens: u64, now: DateTime<Utc>) {
        let mut record = self.entry(tenant, now);
        record.roll_over(now);

        record.daily_tokens += tokens;
        record.monthly_tokens += tokens;
        record.daily_requests += 1;

        gauge!("gateway_quota_usage", "tenant" => tenant.to_string(), "kind" => "daily_tokens")
            .set(record.daily_tokens as f64);
        gauge!("gateway_quota_usage", "tenant" => tenant.to_string(), "kind" => "daily_requests")
            .set(record.daily_requests as f64);
        gauge!("gateway_quota_usage", "tenant" => tenant.to_string(), "kind" => "monthly_tokens")
            .set(record.monthly_tokens as f64);
    }

    /// Current counters for `tenant`, creating the record if absent.
    pub fn usage(&self, tenant: &str) -> QuotaUsage {
        self.usage_at(tenant, Utc::now())
    }

    fn usage_at(&self, tenant: &str, now: DateTime<Utc>) -> QuotaUsage {
        let config = &self.inner.config;
        let mut record = self.entry(tenant, now);
        record.roll_over(now);

        QuotaUsage {
            daily_tokens: record.daily_tokens,
            daily_requests: record.daily_requests,
            monthly_tokens: record.monthly_tokens,
            daily_limit_tokens: config.daily_token_limit,
            daily_limit_requests: config.daily_request_limit,
            monthly_limit_tokens: config.monthly_token_limit,
            daily_reset_at: record.daily_reset_at.to_rfc3339(),
            monthly_reset_at: record.monthly_reset_at.to_rfc3339(),
        }
    }

    /// Counters for every known tenant, keyed by tenant.
    pub fn all_usage(&self) -> BTreeMap<String, QuotaUsage> {
        let tenants: Vec<String> = self
            .inner
            .records
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        tenants
            .into_iter()
            .map(|tenant| {
                let usage = self.usage(&tenant);
                (tenant, usage)
            })
            .collect()
    }

    fn entry(
        &self,
        tenant: &str,
        now: DateTime<Utc>,
    ) -> dashmap::mapref::one::RefMut<'_, String, QuotaRecord> {
        self.inner
            .records
            .entry(tenant.to_string())
            .or_insert_with(|| QuotaRecord::new(now))
    }
}
