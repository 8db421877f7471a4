//! `concierge-billing` — tenant subscription sync and the billing subsystem's
//! daily jobs (C11).
//!
//! # Overview
//!
//! Payment-provider webhooks are verified and applied in [`webhook`],
//! deduplicated against the `payment_webhook_events` idempotence ledger so a
//! redelivered event never double-applies. [`engine::BillingEngine`] then
//! drives three daily jobs, each gated by the `scheduler_state` table so it
//! runs at most once per UTC day:
//!
//! | Job             | Behaviour                                                          |
//! |------------------|--------------------------------------------------------------------|
//! | suspension       | Hard-suspends `past_due`/`unpaid` tenants past their grace period  |
//! | usage_push       | Pushes yesterday's metered minutes, retries a stale failed push    |
//! | quota_alerts     | Emails tenants who crossed 80% of their included minutes this month |

pub mod db;
pub mod engine;
pub mod error;
pub mod production;
pub mod quota;
pub mod signature;
pub mod store;
pub mod stripe_sink;
pub mod suspension;
pub mod types;
pub mod usage;
pub mod webhook;

pub use engine::BillingEngine;
pub use error::{BillingError, Result};
pub use production::{BillingQuotaSnapshots, HttpEmailSink, JournalMinutesSource, SqlTenantContact};
pub use quota::{run_quota_alerts_80, QuotaAlertSink, QuotaSnapshotSource, TenantContact};
pub use signature::verify_webhook_signature;
pub use stripe_sink::StripeUsageSink;
pub use suspension::{run_suspension_job, GRACE_PERIOD};
pub use types::{
    BillingStatus, PushStatus, QuotaAlertSummary, SuspensionMode, SuspensionSummary, TenantBilling,
    UsagePushRecord, UsagePushSummary,
};
pub use usage::{run_metered_usage_push, MinutesSource, UsageSink};
pub use webhook::handle_webhook;
