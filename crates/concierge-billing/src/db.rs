use rusqlite::Connection;

use crate::error::Result;

/// Initialise the billing schema in `conn` (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tenant_billing (
            tenant_id            TEXT    NOT NULL PRIMARY KEY,
            customer_id          TEXT    NOT NULL,
            subscription_id      TEXT,
            status               TEXT    NOT NULL,
            plan_key             TEXT    NOT NULL DEFAULT '',
            metered_item_id      TEXT,
            included_minutes     INTEGER NOT NULL DEFAULT 0,
            current_period_start TEXT    NOT NULL,
            current_period_end   TEXT    NOT NULL,
            is_suspended         INTEGER NOT NULL DEFAULT 0,
            suspension_mode      TEXT,
            force_active_until   TEXT,
            updated_at           TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_tenant_billing_customer
            ON tenant_billing (customer_id);

        -- Idempotence ledger: one row per processed payment-provider event.
        CREATE TABLE IF NOT EXISTS payment_webhook_events (
            event_id    TEXT NOT NULL PRIMARY KEY,
            kind        TEXT NOT NULL,
            received_at TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS usage_push_log (
            tenant_id  TEXT    NOT NULL,
            usage_date TEXT    NOT NULL,
            minutes    INTEGER NOT NULL,
            status     TEXT    NOT NULL,
            last_error TEXT,
            PRIMARY KEY (tenant_id, usage_date)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS quota_alert_log (
            tenant_id  TEXT NOT NULL,
            month_utc  TEXT NOT NULL,
            alert_type TEXT NOT NULL,
            sent_at    TEXT NOT NULL,
            PRIMARY KEY (tenant_id, month_utc, alert_type)
        ) STRICT;

        -- Tracks the last UTC date a named daily job completed, so the
        -- tick loop runs each job at most once per day.
        CREATE TABLE IF NOT EXISTS scheduler_state (
            job_name      TEXT NOT NULL PRIMARY KEY,
            last_run_date TEXT
        ) STRICT;

        -- Contact address to reach for billing notifications, captured
        -- opportunistically off webhook payloads that carry one.
        CREATE TABLE IF NOT EXISTS tenant_contacts (
            tenant_id  TEXT NOT NULL PRIMARY KEY,
            email      TEXT NOT NULL,
            name       TEXT NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
