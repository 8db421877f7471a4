//! `concierge-tenants` — tenant resolver (C1): maps inbound channel
//! identifiers and API keys to a tenant, and serves tenant configuration
//! with a short TTL cache in front of the DB.

pub mod db;
pub mod error;
pub mod resolver;
pub mod types;

pub use error::{Result, TenantError};
pub use resolver::{normalize_e164, TenantResolver};
pub use types::{FlagSource, TenantFlags, TenantRoute, FLAG_KEYS};
