//! Switchboard: a multi-tenant admission gateway fronting a pool of
//! OpenAI-compatible inference backends.
//!
//! Every request runs the same admission sequence (tenant extraction,
//! rate limit, authentication, concurrency gate, quota) and is proxied
//! to a healthy backend under a circuit-breaker guard, either as a one-shot
//! JSON call or as a transformed server-sent-event stream.

pub mod auth;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod proxy;
pub mod redact;
pub mod settings;
pub mod state;
pub mod tenant;
pub mod tokens;

mod http;

pub use error::GatewayError;
pub use http::router;
pub use settings::Settings;
pub use state::Gateway;
