//! Production implementations of the billing engine's pluggable sources and
//! sinks (§4.11 / §9). Each is a thin wrapper over a `rusqlite::Connection`
//! or a `reqwest::Client`, following the same shape as [`crate::stripe_sink`].

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{BillingError, Result};
use crate::quota::{QuotaAlertSink, QuotaSnapshotSource, TenantContact};
use crate::store;
use crate::usage::MinutesSource;

/// Reports billable minutes from the call journal: the elapsed time between
/// the first and last message of every call a tenant had on a given day.
/// Opens its own connection against the journal database, since the
/// journal schema lives in a separate crate this one does not depend on.
pub struct JournalMinutesSource {
    conn: Connection,
}

impl JournalMinutesSource {
    pub fn open(journal_db_path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(journal_db_path)?;
        Ok(Self { conn })
    }
}

impl MinutesSource for JournalMinutesSource {
    fn minutes_used(&self, tenant_id: &str, day: NaiveDate) -> Result<i64> {
        let tenant_id: i64 = tenant_id
            .parse()
            .map_err(|_| BillingError::Malformed(format!("non-numeric tenant id: {tenant_id}")))?;
        let day_str = day.to_string();

        let mut stmt = self.conn.prepare(
            "SELECT MIN(ts), MAX(ts) FROM call_messages
             WHERE tenant_id = ?1 AND substr(ts, 1, 10) = ?2
             GROUP BY call_id",
        )?;
        let spans = stmt
            .query_map(params![tenant_id, day_str], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .filter_map(|r| r.ok());

        let mut total_seconds: i64 = 0;
        for (start, end) in spans {
            let (Ok(start), Ok(end)) = (
                chrono::DateTime::parse_from_rfc3339(&start),
                chrono::DateTime::parse_from_rfc3339(&end),
            ) else {
                continue;
            };
            total_seconds += (end - start).num_seconds().max(0);
        }
        Ok((total_seconds + 59) / 60)
    }
}

/// Reports a tenant's included-vs-used minutes for a calendar month from
/// the billing subsystem's own tables: `included_minutes` off the
/// subscription snapshot, `used` summed from `usage_push_log`. Holds its
/// own connection to the billing database (distinct from the engine's own)
/// so it can be boxed as a `'static` trait object.
pub struct BillingQuotaSnapshots {
    conn: Connection,
}

impl BillingQuotaSnapshots {
    pub fn open(billing_db_path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(billing_db_path)?;
        crate::db::init_db(&conn)?;
        Ok(Self { conn })
    }
}

impl QuotaSnapshotSource for BillingQuotaSnapshots {
    fn snapshot_month(&self, tenant_id: &str, month_utc: &str) -> Result<(i64, i64)> {
        let Some(billing) = store::get_tenant_billing(&self.conn, tenant_id)? else {
            return Ok((0, 0));
        };
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(minutes), 0) FROM usage_push_log
             WHERE tenant_id = ?1 AND substr(usage_date, 1, 7) = ?2",
            params![tenant_id, month_utc],
            |r| r.get(0),
        )?;
        Ok((billing.included_minutes, used))
    }
}

/// Resolves the alert contact from `tenant_contacts`, populated
/// opportunistically off payment-provider webhook payloads. Holds its own
/// connection for the same `'static`-boxing reason as above.
pub struct SqlTenantContact {
    conn: Connection,
}

impl SqlTenantContact {
    pub fn open(billing_db_path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(billing_db_path)?;
        crate::db::init_db(&conn)?;
        Ok(Self { conn })
    }
}

impl TenantContact for SqlTenantContact {
    fn contact(&self, tenant_id: &str) -> Result<Option<(String, String)>> {
        store::get_contact(&self.conn, tenant_id)
    }
}

/// Delivers the 80%-quota email via a generic bearer-token transactional
/// email HTTP API, following the same `reqwest::Client` shape as
/// [`crate::stripe_sink::StripeUsageSink`].
pub struct HttpEmailSink {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    from_email: String,
}

impl HttpEmailSink {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: api_base.into(),
            from_email: from_email.into(),
        }
    }
}

#[async_trait]
impl QuotaAlertSink for HttpEmailSink {
    async fn send_quota_alert_80(
        &self,
        to_email: &str,
        tenant_name: &str,
        used_minutes: i64,
        included_minutes: i64,
        month_utc: &str,
    ) -> Result<()> {
        let body = serde_json::json!({
            "from": self.from_email,
            "to": to_email,
            "subject": format!("{tenant_name}: {month_utc} usage has crossed 80% of plan minutes"),
            "text": format!(
                "{tenant_name} has used {used_minutes} of {included_minutes} included minutes for {month_utc}."
            ),
        });

        let resp = self
            .client
            .post(format!("{}/messages", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BillingError::Malformed(format!("quota alert email failed ({status}): {text}")));
        }
        debug!(to_email, month_utc, "quota alert email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::store::upsert_billing_from_subscription;
    use crate::types::BillingStatus;
    use chrono::{Duration, Utc};

    fn billing_conn_at(path: &std::path::Path, tenant_id: &str) -> Connection {
        let c = Connection::open(path).unwrap();
        init_db(&c).unwrap();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, tenant_id, "cus_1", "sub_1", BillingStatus::Active, "pro", None,
            now, now + Duration::days(30), now,
        ).unwrap();
        c
    }

    #[test]
    fn minutes_used_sums_elapsed_time_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let conn = Connection::open(&path).unwrap();
            concierge_journal::db::init_db(&conn).unwrap();
            concierge_journal::journal::append_message(&conn, 1, "call-1", concierge_journal::types::Role::User, "hi", "2026-07-01T10:00:00Z").unwrap();
            concierge_journal::journal::append_message(&conn, 1, "call-1", concierge_journal::types::Role::Agent, "bye", "2026-07-01T10:05:00Z").unwrap();
        }

        let source = JournalMinutesSource::open(&path).unwrap();
        let minutes = source.minutes_used("1", chrono::NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()).unwrap();
        assert_eq!(minutes, 5);
    }

    #[test]
    fn quota_snapshot_reads_included_and_used_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billing.db");
        {
            let conn = billing_conn_at(&path, "t1");
            conn.execute(
                "INSERT INTO usage_push_log (tenant_id, usage_date, minutes, status, last_error)
                 VALUES ('t1', '2026-07-05', 40, 'sent', NULL)",
                [],
            ).unwrap();
            conn.execute(
                "UPDATE tenant_billing SET included_minutes = 100 WHERE tenant_id = 't1'",
                [],
            ).unwrap();
        }

        let snapshots = BillingQuotaSnapshots::open(&path).unwrap();
        let (included, used) = snapshots.snapshot_month("t1", "2026-07").unwrap();
        assert_eq!(included, 100);
        assert_eq!(used, 40);
    }

    #[test]
    fn contact_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billing.db");
        {
            let conn = billing_conn_at(&path, "t1");
            store::upsert_contact(&conn, "t1", "owner@example.com", "Cabinet Dupont").unwrap();
        }

        let contact = SqlTenantContact::open(&path).unwrap();
        assert_eq!(
            contact.contact("t1").unwrap(),
            Some(("owner@example.com".to_string(), "Cabinet Dupont".to_string()))
        );
    }
}
