use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use concierge_core::types::TenantId;

/// Where a `TenantFlags` value was loaded from — surfaced so callers (and
/// logs) can tell a genuine per-tenant override from the hardcoded default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSource {
    Db,
    Default,
}

/// Feature flag keys recognized on a tenant's `tenant_config.flags_json`
/// blob. Unknown keys are dropped rather than rejected, so new clients can
/// write flags an older server doesn't understand yet.
pub const FLAG_KEYS: &[&str] = &[
    "enable_bargein_slot_choice",
    "enable_sequential_slots",
    "enable_no_faq_guard",
    "enable_yes_ambiguous_router",
];

/// Resolved, merged feature flags for one tenant (defaults overlaid by any
/// DB-stored overrides).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantFlags {
    pub tenant_id: TenantId,
    pub flags: HashMap<String, bool>,
    pub source: FlagSource,
}

impl TenantFlags {
    pub fn get(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }
}

/// A single routing entry: `(channel, key)` → tenant. `key` is a normalized
/// E.164 number for voice/whatsapp, or an API key for web.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRoute {
    pub channel: concierge_core::types::Channel,
    pub key: String,
    pub tenant_id: TenantId,
}
