use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use crate::error::Result;
use crate::store::all_active_tenant_billing;
use crate::types::{PushStatus, UsagePushSummary};

/// Reports how many billable minutes a tenant used on a given UTC day.
/// Backed by the call journal in production; a test double in tests.
pub trait MinutesSource: Send + Sync {
    fn minutes_used(&self, tenant_id: &str, day: NaiveDate) -> Result<i64>;
}

/// Pushes one tenant-day of metered usage to the payment provider.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn push_usage(&self, metered_item_id: &str, quantity: i64, as_of: DateTime<Utc>) -> Result<()>;
}

/// Atomically claims a (tenant, day) usage-push slot: succeeds on first
/// attempt, or when the previous attempt is `failed` and eligible for retry.
fn try_acquire_push(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    day: NaiveDate,
    minutes: i64,
) -> Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT status FROM usage_push_log WHERE tenant_id = ?1 AND usage_date = ?2",
            params![tenant_id, day.to_string()],
            |r| r.get(0),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO usage_push_log (tenant_id, usage_date, minutes, status, last_error)
                 VALUES (?1, ?2, ?3, 'pending', NULL)",
                params![tenant_id, day.to_string(), minutes],
            )?;
            Ok(true)
        }
        Some(status) if status == PushStatus::Failed.to_string() => {
            conn.execute(
                "UPDATE usage_push_log SET minutes = ?1, status = 'pending', last_error = NULL
                 WHERE tenant_id = ?2 AND usage_date = ?3",
                params![minutes, tenant_id, day.to_string()],
            )?;
            Ok(true)
        }
        Some(_) => Ok(false),
    }
}

fn mark_result(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    day: NaiveDate,
    result: &Result<()>,
) -> Result<()> {
    match result {
        Ok(()) => {
            conn.execute(
                "UPDATE usage_push_log SET status = 'sent', last_error = NULL
                 WHERE tenant_id = ?1 AND usage_date = ?2",
                params![tenant_id, day.to_string()],
            )?;
        }
        Err(e) => {
            conn.execute(
                "UPDATE usage_push_log SET status = 'failed', last_error = ?1
                 WHERE tenant_id = ?2 AND usage_date = ?3",
                params![e.to_string(), tenant_id, day.to_string()],
            )?;
        }
    }
    Ok(())
}

async fn push_day(
    conn: &rusqlite::Connection,
    sink: &dyn UsageSink,
    minutes_source: &dyn MinutesSource,
    tenant_id: &str,
    metered_item_id: &str,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> Result<bool> {
    let minutes = minutes_source.minutes_used(tenant_id, day)?;
    if !try_acquire_push(conn, tenant_id, day, minutes)? {
        return Ok(false);
    }
    let result = sink.push_usage(metered_item_id, minutes, now).await;
    let pushed = result.is_ok();
    if let Err(ref e) = result {
        warn!(tenant_id, %day, "usage push failed: {e}");
    }
    mark_result(conn, tenant_id, day, &result)?;
    Ok(pushed)
}

/// Pushes the previous UTC day's metered usage for every active tenant, then
/// retries the day before that if it previously failed — covering an outage
/// of up to 48h without losing revenue (per the two-day retry window).
pub async fn run_metered_usage_push(
    conn: &rusqlite::Connection,
    sink: &dyn UsageSink,
    minutes_source: &dyn MinutesSource,
    now: DateTime<Utc>,
) -> Result<UsagePushSummary> {
    let yesterday = (now - Duration::days(1)).date_naive();
    let day_before = (now - Duration::days(2)).date_naive();
    let mut summary = UsagePushSummary::default();

    for billing in all_active_tenant_billing(conn)? {
        let Some(item_id) = billing.metered_item_id.clone() else { continue };

        match push_day(conn, sink, minutes_source, &billing.tenant_id, &item_id, yesterday, now).await {
            Ok(true) => {
                summary.pushed += 1;
                info!(tenant_id = %billing.tenant_id, day = %yesterday, "usage pushed");
            }
            Ok(false) => {}
            Err(_) => summary.failed += 1,
        }

        match push_day(conn, sink, minutes_source, &billing.tenant_id, &item_id, day_before, now).await {
            Ok(true) => {
                summary.retried += 1;
                info!(tenant_id = %billing.tenant_id, day = %day_before, "stale usage push retried");
            }
            Ok(false) => {}
            Err(_) => summary.failed += 1,
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedMinutes(i64);
    impl MinutesSource for FixedMinutes {
        fn minutes_used(&self, _tenant_id: &str, _day: NaiveDate) -> Result<i64> {
            Ok(self.0)
        }
    }

    struct CountingSink {
        calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait]
    impl UsageSink for CountingSink {
        async fn push_usage(&self, _item_id: &str, _quantity: i64, _as_of: DateTime<Utc>) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_until {
                return Err(crate::error::BillingError::Malformed("simulated outage".to_string()));
            }
            Ok(())
        }
    }

    fn conn_with_tenant(item_id: &str) -> rusqlite::Connection {
        let c = rusqlite::Connection::open_in_memory().unwrap();
        init_db(&c).unwrap();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, "t1", "cus_1", "sub_1", BillingStatus::Active, "pro", Some(item_id),
            now, now + Duration::days(30), now,
        ).unwrap();
        c
    }

    #[tokio::test]
    async fn pushes_yesterday_once_and_is_idempotent() {
        let c = conn_with_tenant("si_1");
        let sink = CountingSink { calls: AtomicUsize::new(0), fail_until: 0 };
        let minutes = FixedMinutes(42);
        let now = Utc::now();

        let summary = run_metered_usage_push(&c, &sink, &minutes, now).await.unwrap();
        assert_eq!(summary.pushed, 1);

        let summary2 = run_metered_usage_push(&c, &sink, &minutes, now).await.unwrap();
        assert_eq!(summary2.pushed, 0, "already-sent day must not push again");
    }

    #[tokio::test]
    async fn failed_push_is_retried_the_next_day() {
        let c = conn_with_tenant("si_1");
        let minutes = FixedMinutes(10);
        let now = Utc::now();

        let failing_sink = CountingSink { calls: AtomicUsize::new(0), fail_until: 100 };
        let summary = run_metered_usage_push(&c, &failing_sink, &minutes, now).await.unwrap();
        assert_eq!(summary.failed, 2, "both yesterday and day-before attempts fail");

        let next_day = now + Duration::days(1);
        let recovering_sink = CountingSink { calls: AtomicUsize::new(0), fail_until: 0 };
        let summary = run_metered_usage_push(&c, &recovering_sink, &minutes, next_day).await.unwrap();
        assert!(summary.retried >= 1, "the stale failed day must be retried");
    }

}
