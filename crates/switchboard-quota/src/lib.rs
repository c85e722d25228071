//! Per-tenant usage quotas.
//!
//! The ledger tracks daily tokens, daily requests, and monthly tokens per
//! tenant. Counters roll over at the next UTC midnight and the first of the
//! next UTC month; rollover is applied on every access, so reads never see
//! a stale window. Records live for the process lifetime; they are the
//! ledger, not a cache.

mod ledger;
mod reset;

pub use ledger::{QuotaConfig, QuotaConfigBuilder, QuotaDenial, QuotaKind, QuotaLedger, QuotaUsage};
