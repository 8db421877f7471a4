use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::Result;
use crate::store;
use crate::types::{SuspensionMode, SuspensionSummary};

/// How long a tenant stays delinquent past `current_period_end` before the
/// suspension job suspends it.
pub const GRACE_PERIOD: Duration = Duration::days(3);

/// Suspends every tenant that is `past_due`/`unpaid` and past its grace
/// period, unless protected by an active `force_active_until` override.
/// `past_due`/`unpaid` suspensions are always hard — there is no soft mode
/// for a subscription the provider itself considers delinquent.
pub fn run_suspension_job(conn: &Connection, now: DateTime<Utc>) -> Result<SuspensionSummary> {
    let mut summary = SuspensionSummary::default();

    for billing in store::all_delinquent_candidates(conn)? {
        if billing.has_force_active_override(now) {
            info!(tenant_id = %billing.tenant_id, "suspension skipped, force_active override in effect");
            continue;
        }
        if now <= billing.current_period_end + GRACE_PERIOD {
            continue;
        }
        store::set_tenant_suspended(conn, &billing.tenant_id, SuspensionMode::Hard, now)?;
        warn!(
            event = concierge_core::audit::AuditEvent::TenantSuspendedPastDue.as_str(),
            tenant_id = %billing.tenant_id,
            status = %billing.status,
            "tenant suspended for non-payment"
        );
        summary.suspended += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::store::{get_tenant_billing, set_force_active, upsert_billing_from_subscription};
    use crate::types::BillingStatus;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().unwrap();
        init_db(&c).unwrap();
        c
    }

    #[test]
    fn past_due_tenant_past_grace_is_suspended_hard() {
        let c = conn();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, "t1", "cus_1", "sub_1", BillingStatus::PastDue, "pro", None,
            now - Duration::days(40), now - Duration::days(10), now,
        ).unwrap();

        let summary = run_suspension_job(&c, now).unwrap();
        assert_eq!(summary.suspended, 1);
        let billing = get_tenant_billing(&c, "t1").unwrap().unwrap();
        assert!(billing.is_suspended);
        assert_eq!(billing.suspension_mode, Some(SuspensionMode::Hard));
    }

    #[test]
    fn still_within_grace_period_is_not_suspended() {
        let c = conn();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, "t1", "cus_1", "sub_1", BillingStatus::PastDue, "pro", None,
            now - Duration::days(10), now - Duration::hours(1), now,
        ).unwrap();

        let summary = run_suspension_job(&c, now).unwrap();
        assert_eq!(summary.suspended, 0);
    }

    #[test]
    fn force_active_override_blocks_suspension() {
        let c = conn();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, "t1", "cus_1", "sub_1", BillingStatus::Unpaid, "pro", None,
            now - Duration::days(40), now - Duration::days(10), now,
        ).unwrap();
        set_force_active(&c, "t1", now + Duration::days(7), now).unwrap();

        let summary = run_suspension_job(&c, now).unwrap();
        assert_eq!(summary.suspended, 0);
    }
}
