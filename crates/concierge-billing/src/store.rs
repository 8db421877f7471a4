use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::types::{BillingStatus, SuspensionMode, TenantBilling};

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Row reader shared by every SELECT below.
fn row_to_billing(row: &rusqlite::Row) -> rusqlite::Result<TenantBilling> {
    let status: String = row.get(3)?;
    let period_start: String = row.get(7)?;
    let period_end: String = row.get(8)?;
    let suspension_mode: Option<String> = row.get(10)?;
    let force_active_until: Option<String> = row.get(11)?;
    Ok(TenantBilling {
        tenant_id: row.get(0)?,
        customer_id: row.get(1)?,
        subscription_id: row.get(2)?,
        status: status.parse().unwrap_or(BillingStatus::Incomplete),
        plan_key: row.get(4)?,
        metered_item_id: row.get(5)?,
        included_minutes: row.get(6)?,
        current_period_start: parse_dt(&period_start),
        current_period_end: parse_dt(&period_end),
        is_suspended: row.get::<_, i64>(9)? != 0,
        suspension_mode: suspension_mode.and_then(|s| s.parse().ok()),
        force_active_until: force_active_until.map(|s| parse_dt(&s)),
    })
}

const SELECT_COLUMNS: &str = "tenant_id, customer_id, subscription_id, status, plan_key,
     metered_item_id, included_minutes, current_period_start, current_period_end,
     is_suspended, suspension_mode, force_active_until";

pub fn get_tenant_billing(conn: &rusqlite::Connection, tenant_id: &str) -> Result<Option<TenantBilling>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM tenant_billing WHERE tenant_id = ?1"
    ))?;
    Ok(stmt.query_row([tenant_id], row_to_billing).optional()?)
}

pub fn tenant_id_by_customer_id(conn: &rusqlite::Connection, customer_id: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT tenant_id FROM tenant_billing WHERE customer_id = ?1")?;
    Ok(stmt.query_row([customer_id], |r| r.get(0)).optional()?)
}

pub fn all_active_tenant_billing(conn: &rusqlite::Connection) -> Result<Vec<TenantBilling>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM tenant_billing WHERE is_suspended = 0"
    ))?;
    let rows = stmt
        .query_map([], row_to_billing)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn all_delinquent_candidates(conn: &rusqlite::Connection) -> Result<Vec<TenantBilling>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM tenant_billing
         WHERE status IN ('past_due', 'unpaid') AND is_suspended = 0"
    ))?;
    let rows = stmt
        .query_map([], row_to_billing)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Insert or update a tenant's billing snapshot from a subscription event.
#[allow(clippy::too_many_arguments)]
pub fn upsert_billing_from_subscription(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    customer_id: &str,
    subscription_id: &str,
    status: BillingStatus,
    plan_key: &str,
    metered_item_id: Option<&str>,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tenant_billing
            (tenant_id, customer_id, subscription_id, status, plan_key, metered_item_id,
             included_minutes, current_period_start, current_period_end,
             is_suspended, suspension_mode, force_active_until, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, 0, NULL, NULL, ?9)
         ON CONFLICT(tenant_id) DO UPDATE SET
            customer_id = excluded.customer_id,
            subscription_id = excluded.subscription_id,
            status = excluded.status,
            plan_key = excluded.plan_key,
            metered_item_id = excluded.metered_item_id,
            current_period_start = excluded.current_period_start,
            current_period_end = excluded.current_period_end,
            updated_at = excluded.updated_at",
        params![
            tenant_id,
            customer_id,
            subscription_id,
            status.to_string(),
            plan_key,
            metered_item_id,
            current_period_start.to_rfc3339(),
            current_period_end.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn update_billing_status(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    status: BillingStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE tenant_billing SET status = ?1, updated_at = ?2 WHERE tenant_id = ?3",
        params![status.to_string(), now.to_rfc3339(), tenant_id],
    )?;
    Ok(())
}

pub fn clear_subscription(conn: &rusqlite::Connection, tenant_id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE tenant_billing SET subscription_id = NULL, status = 'canceled', updated_at = ?1
         WHERE tenant_id = ?2",
        params![now.to_rfc3339(), tenant_id],
    )?;
    Ok(())
}

pub fn set_tenant_suspended(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    mode: SuspensionMode,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE tenant_billing SET is_suspended = 1, suspension_mode = ?1, updated_at = ?2
         WHERE tenant_id = ?3",
        params![mode.to_string(), now.to_rfc3339(), tenant_id],
    )?;
    Ok(())
}

pub fn set_tenant_unsuspended(conn: &rusqlite::Connection, tenant_id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE tenant_billing SET is_suspended = 0, suspension_mode = NULL, updated_at = ?1
         WHERE tenant_id = ?2",
        params![now.to_rfc3339(), tenant_id],
    )?;
    Ok(())
}

pub fn set_force_active(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    until: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE tenant_billing SET force_active_until = ?1, updated_at = ?2 WHERE tenant_id = ?3",
        params![until.to_rfc3339(), now.to_rfc3339(), tenant_id],
    )?;
    Ok(())
}

/// Records (or refreshes) the contact address to alert for a tenant.
/// Called opportunistically whenever a webhook payload happens to carry one.
pub fn upsert_contact(conn: &rusqlite::Connection, tenant_id: &str, email: &str, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO tenant_contacts (tenant_id, email, name) VALUES (?1, ?2, ?3)
         ON CONFLICT(tenant_id) DO UPDATE SET email = excluded.email, name = excluded.name",
        params![tenant_id, email, name],
    )?;
    Ok(())
}

pub fn get_contact(conn: &rusqlite::Connection, tenant_id: &str) -> Result<Option<(String, String)>> {
    let mut stmt = conn.prepare("SELECT email, name FROM tenant_contacts WHERE tenant_id = ?1")?;
    Ok(stmt.query_row([tenant_id], |r| Ok((r.get(0)?, r.get(1)?))).optional()?)
}

/// Atomically claim a webhook event id. Returns `true` if this call claimed
/// it (first delivery), `false` if it was already processed (replay).
pub fn try_acquire_webhook_event(
    conn: &rusqlite::Connection,
    event_id: &str,
    kind: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let n = conn.execute(
        "INSERT INTO payment_webhook_events (event_id, kind, received_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(event_id) DO NOTHING",
        params![event_id, kind, now.to_rfc3339()],
    )?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::Duration;

    fn conn() -> rusqlite::Connection {
        let c = rusqlite::Connection::open_in_memory().unwrap();
        init_db(&c).unwrap();
        c
    }

    #[test]
    fn upsert_then_fetch_round_trips() {
        let c = conn();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, "t1", "cus_1", "sub_1", BillingStatus::Active, "pro",
            Some("si_1"), now, now + Duration::days(30), now,
        ).unwrap();
        let b = get_tenant_billing(&c, "t1").unwrap().unwrap();
        assert_eq!(b.customer_id, "cus_1");
        assert_eq!(b.status, BillingStatus::Active);
        assert!(!b.is_suspended);
    }

    #[test]
    fn webhook_event_is_claimed_exactly_once() {
        let c = conn();
        let now = Utc::now();
        assert!(try_acquire_webhook_event(&c, "evt_1", "invoice.paid", now).unwrap());
        assert!(!try_acquire_webhook_event(&c, "evt_1", "invoice.paid", now).unwrap());
    }

    #[test]
    fn tenant_lookup_by_customer_id() {
        let c = conn();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, "t1", "cus_1", "sub_1", BillingStatus::Active, "pro",
            None, now, now + Duration::days(30), now,
        ).unwrap();
        assert_eq!(tenant_id_by_customer_id(&c, "cus_1").unwrap(), Some("t1".to_string()));
        assert_eq!(tenant_id_by_customer_id(&c, "cus_unknown").unwrap(), None);
    }

    #[test]
    fn suspend_then_unsuspend_round_trips() {
        let c = conn();
        let now = Utc::now();
        upsert_billing_from_subscription(
            &c, "t1", "cus_1", "sub_1", BillingStatus::PastDue, "pro",
            None, now, now - Duration::days(1), now,
        ).unwrap();
        set_tenant_suspended(&c, "t1", SuspensionMode::Hard, now).unwrap();
        let b = get_tenant_billing(&c, "t1").unwrap().unwrap();
        assert!(b.is_suspended);
        assert_eq!(b.suspension_mode, Some(SuspensionMode::Hard));

        set_tenant_unsuspended(&c, "t1", now).unwrap();
        let b = get_tenant_billing(&c, "t1").unwrap().unwrap();
        assert!(!b.is_suspended);
    }
}
