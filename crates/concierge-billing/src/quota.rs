use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use crate::error::Result;
use crate::store::all_active_tenant_billing;
use crate::types::QuotaAlertSummary;

const ALERT_TYPE_80PCT: &str = "80pct";

/// Reports a tenant's minutes quota for a calendar month (`YYYY-MM`), as
/// `(included_minutes, used_minutes)`.
pub trait QuotaSnapshotSource: Send + Sync {
    fn snapshot_month(&self, tenant_id: &str, month_utc: &str) -> Result<(i64, i64)>;
}

/// Resolves the contact address and display name to alert for a tenant.
pub trait TenantContact: Send + Sync {
    fn contact(&self, tenant_id: &str) -> Result<Option<(String, String)>>;
}

/// Delivers the actual 80% quota-warning email.
#[async_trait]
pub trait QuotaAlertSink: Send + Sync {
    async fn send_quota_alert_80(
        &self,
        to_email: &str,
        tenant_name: &str,
        used_minutes: i64,
        included_minutes: i64,
        month_utc: &str,
    ) -> Result<()>;
}

fn already_sent(conn: &rusqlite::Connection, tenant_id: &str, month_utc: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM quota_alert_log WHERE tenant_id = ?1 AND month_utc = ?2 AND alert_type = ?3",
            params![tenant_id, month_utc, ALERT_TYPE_80PCT],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn mark_sent(conn: &rusqlite::Connection, tenant_id: &str, month_utc: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO quota_alert_log (tenant_id, month_utc, alert_type, sent_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(tenant_id, month_utc, alert_type) DO NOTHING",
        params![tenant_id, month_utc, ALERT_TYPE_80PCT, now.to_rfc3339()],
    )?;
    Ok(())
}

/// Sends an 80% quota-warning email to every active tenant whose usage for
/// `month_utc` (`YYYY-MM`) has crossed 80% but not yet 100% of its included
/// minutes. At most one email per tenant per month (`quota_alert_log`).
pub async fn run_quota_alerts_80(
    conn: &rusqlite::Connection,
    snapshots: &dyn QuotaSnapshotSource,
    contacts: &dyn TenantContact,
    sink: &dyn QuotaAlertSink,
    month_utc: &str,
    now: DateTime<Utc>,
) -> Result<QuotaAlertSummary> {
    let mut summary = QuotaAlertSummary::default();

    for billing in all_active_tenant_billing(conn)? {
        let tenant_id = &billing.tenant_id;
        let (included, used) = snapshots.snapshot_month(tenant_id, month_utc)?;
        if included <= 0 {
            continue;
        }
        let usage_pct = (used as f64 / included as f64) * 100.0;
        if !(80.0..100.0).contains(&usage_pct) {
            continue;
        }
        if already_sent(conn, tenant_id, month_utc)? {
            summary.skipped += 1;
            continue;
        }

        let Some((email, name)) = contacts.contact(tenant_id)? else {
            info!(tenant_id, "quota alert skipped, no contact on file");
            summary.skipped += 1;
            continue;
        };
        if email.trim().is_empty() {
            summary.skipped += 1;
            continue;
        }

        match sink.send_quota_alert_80(&email, &name, used, included, month_utc).await {
            Ok(()) => {
                mark_sent(conn, tenant_id, month_utc, now)?;
                summary.sent += 1;
                info!(tenant_id, month_utc, "quota_alert_80 sent");
            }
            Err(e) => {
                warn!(tenant_id, "quota_alert_80 send failed: {e}");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::store::upsert_billing_from_subscription;
    use crate::types::BillingStatus;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedSnapshots(HashMap<String, (i64, i64)>);
    impl QuotaSnapshotSource for FixedSnapshots {
        fn snapshot_month(&self, tenant_id: &str, _month_utc: &str) -> Result<(i64, i64)> {
            Ok(self.0.get(tenant_id).copied().unwrap_or((0, 0)))
        }
    }

    struct FixedContact;
    impl TenantContact for FixedContact {
        fn contact(&self, tenant_id: &str) -> Result<Option<(String, String)>> {
            Ok(Some((format!("{tenant_id}@example.com"), tenant_id.to_string())))
        }
    }

    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QuotaAlertSink for RecordingSink {
        async fn send_quota_alert_80(
            &self,
            to_email: &str,
            _tenant_name: &str,
            _used_minutes: i64,
            _included_minutes: i64,
            _month_utc: &str,
        ) -> Result<()> {
            self.sent.lock().unwrap().push(to_email.to_string());
            Ok(())
        }
    }

    fn conn_with_tenant(tenant_id: &str) -> rusqlite::Connection {
        let c = rusqlite::Connection::open_in_memory().unwrap();
        init_db(&c).unwrap();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, tenant_id, "cus_1", "sub_1", BillingStatus::Active, "pro", None,
            now, now + Duration::days(30), now,
        ).unwrap();
        c
    }

    #[tokio::test]
    async fn sends_once_when_crossing_80_percent() {
        let c = conn_with_tenant("t1");
        let snapshots = FixedSnapshots(HashMap::from([("t1".to_string(), (100, 85))]));
        let sink = RecordingSink { sent: Mutex::new(Vec::new()) };
        let now = Utc::now();

        let summary = run_quota_alerts_80(&c, &snapshots, &FixedContact, &sink, "2026-07", now).await.unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(sink.sent.lock().unwrap().len(), 1);

        let summary2 = run_quota_alerts_80(&c, &snapshots, &FixedContact, &sink, "2026-07", now).await.unwrap();
        assert_eq!(summary2.sent, 0);
        assert_eq!(summary2.skipped, 1, "anti-spam must block a second email the same month");
    }

    #[tokio::test]
    async fn usage_at_100_percent_is_not_an_80_percent_alert() {
        let c = conn_with_tenant("t1");
        let snapshots = FixedSnapshots(HashMap::from([("t1".to_string(), (100, 120))]));
        let sink = RecordingSink { sent: Mutex::new(Vec::new()) };

        let summary = run_quota_alerts_80(&c, &snapshots, &FixedContact, &sink, "2026-07", Utc::now()).await.unwrap();
        assert_eq!(summary.sent, 0);
    }

    #[tokio::test]
    async fn usage_below_80_percent_is_ignored() {
        let c = conn_with_tenant("t1");
        let snapshots = FixedSnapshots(HashMap::from([("t1".to_string(), (100, 50))]));
        let sink = RecordingSink { sent: Mutex::new(Vec::new()) };

        let summary = run_quota_alerts_80(&c, &snapshots, &FixedContact, &sink, "2026-07", Utc::now()).await.unwrap();
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.skipped, 0);
    }
}
