use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive integer tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub i64);

impl TenantId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TenantId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Lifecycle status of a tenant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "active"),
            TenantStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// Which calendar backend a tenant is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProvider {
    Google,
    #[default]
    None,
}

/// Whether a tenant requires explicit consent before booking, or implies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsentMode {
    #[default]
    Implicit,
    Explicit,
}

/// Full tenant configuration blob (§3 DATA MODEL — Tenant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub display_name: String,
    pub timezone: String,
    pub status: TenantStatus,
    pub calendar_provider: CalendarProvider,
    pub calendar_id: Option<String>,
    pub business_name: String,
    pub transfer_phone: Option<String>,
    pub consent_mode: ConsentMode,
}

/// Inbound channel a conversation turn arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Voice,
    Whatsapp,
    Web,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Voice => "voice",
            Channel::Whatsapp => "whatsapp",
            Channel::Web => "web",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voice" => Ok(Channel::Voice),
            "whatsapp" => Ok(Channel::Whatsapp),
            "web" => Ok(Channel::Web),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

/// Time-of-day preference the caller expressed for their appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Any,
}

/// How the caller's contact value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Email,
    Phone,
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactKind::Email => write!(f, "email"),
            ContactKind::Phone => write!(f, "phone"),
        }
    }
}

/// Where a canonical slot originated, so downstream code knows whether
/// cancelling it requires an external-provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSource {
    Calendar,
    Internal,
}

/// The single shape slots are normalized into at every boundary crossing
/// (§3 DATA MODEL — Canonical slot record; §9 DESIGN NOTES).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSlot {
    pub id: String,
    pub start_iso: String,
    pub end_iso: String,
    pub label: String,
    pub label_vocal: String,
    pub day: String,
    pub source: SlotSource,
}
