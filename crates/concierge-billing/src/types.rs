use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Mirrors the subscription statuses the payment provider reports on a
/// `customer.subscription.*` webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingStatus::Active => "active",
            BillingStatus::Trialing => "trialing",
            BillingStatus::PastDue => "past_due",
            BillingStatus::Unpaid => "unpaid",
            BillingStatus::Canceled => "canceled",
            BillingStatus::Incomplete => "incomplete",
        };
        write!(f, "{s}")
    }
}

impl FromStr for BillingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(BillingStatus::Active),
            "trialing" => Ok(BillingStatus::Trialing),
            "past_due" => Ok(BillingStatus::PastDue),
            "unpaid" => Ok(BillingStatus::Unpaid),
            "canceled" => Ok(BillingStatus::Canceled),
            "incomplete" => Ok(BillingStatus::Incomplete),
            other => Err(format!("unknown billing status: {other}")),
        }
    }
}

impl BillingStatus {
    /// A status that should keep a previously-suspended tenant suspended.
    pub fn is_delinquent(self) -> bool {
        matches!(self, BillingStatus::PastDue | BillingStatus::Unpaid)
    }

    /// A status that, seen on a webhook update, should lift an existing suspension.
    pub fn is_reactivating(self) -> bool {
        matches!(self, BillingStatus::Active | BillingStatus::Trialing)
    }
}

/// Whether a suspension blocks all tenant traffic (`Hard`) or only degrades
/// it, e.g. voice still answers but booking is disabled (`Soft`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionMode {
    Hard,
    Soft,
}

impl std::fmt::Display for SuspensionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", if *self == SuspensionMode::Hard { "hard" } else { "soft" })
    }
}

impl FromStr for SuspensionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hard" => Ok(SuspensionMode::Hard),
            "soft" => Ok(SuspensionMode::Soft),
            other => Err(format!("unknown suspension mode: {other}")),
        }
    }
}

/// A tenant's subscription snapshot, kept in sync from payment-provider webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantBilling {
    pub tenant_id: String,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub status: BillingStatus,
    pub plan_key: String,
    pub metered_item_id: Option<String>,
    pub included_minutes: i64,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub is_suspended: bool,
    pub suspension_mode: Option<SuspensionMode>,
    pub force_active_until: Option<DateTime<Utc>>,
}

impl TenantBilling {
    /// A manual override still protecting the tenant from the suspension job.
    pub fn has_force_active_override(&self, now: DateTime<Utc>) -> bool {
        self.force_active_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for PushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PushStatus::Pending => "pending",
            PushStatus::Sent => "sent",
            PushStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PushStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PushStatus::Pending),
            "sent" => Ok(PushStatus::Sent),
            "failed" => Ok(PushStatus::Failed),
            other => Err(format!("unknown push status: {other}")),
        }
    }
}

/// One day's worth of metered usage pushed (or attempted) for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsagePushRecord {
    pub tenant_id: String,
    pub usage_date: NaiveDate,
    pub minutes: i64,
    pub status: PushStatus,
    pub last_error: Option<String>,
}

/// Outcome of a single day's metered-usage push run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UsagePushSummary {
    pub pushed: u32,
    pub retried: u32,
    pub failed: u32,
}

/// Outcome of a suspension sweep.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SuspensionSummary {
    pub suspended: u32,
    pub reactivated: u32,
}

/// Outcome of an 80% quota-alert sweep.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QuotaAlertSummary {
    pub sent: u32,
    pub skipped: u32,
}
