use rusqlite::{Connection, Result};

/// Initialize all tables for the tenants subsystem. Safe to call on every
/// startup — CREATE IF NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_tenants_table(conn)?;
    create_tenant_config_table(conn)?;
    create_tenant_routing_table(conn)?;
    Ok(())
}

fn create_tenants_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenants (
            tenant_id           INTEGER PRIMARY KEY,
            display_name        TEXT NOT NULL,
            timezone             TEXT NOT NULL DEFAULT 'Europe/Paris',
            status               TEXT NOT NULL DEFAULT 'active',
            calendar_provider    TEXT NOT NULL DEFAULT 'none',
            calendar_id          TEXT,
            business_name        TEXT NOT NULL DEFAULT '',
            transfer_phone       TEXT,
            consent_mode         TEXT NOT NULL DEFAULT 'implicit',
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        );",
    )
}

fn create_tenant_config_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenant_config (
            tenant_id    INTEGER PRIMARY KEY REFERENCES tenants(tenant_id),
            flags_json   TEXT NOT NULL DEFAULT '{}',
            params_json  TEXT NOT NULL DEFAULT '{}',
            updated_at   TEXT NOT NULL
        );",
    )
}

fn create_tenant_routing_table(conn: &Connection) -> Result<()> {
    // UNIQUE(channel, key) is the routing invariant: one tenant per
    // (channel, normalized identifier).
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenant_routing (
            channel     TEXT NOT NULL,
            key         TEXT NOT NULL,
            tenant_id   INTEGER NOT NULL REFERENCES tenants(tenant_id),
            UNIQUE(channel, key)
        );
        CREATE INDEX IF NOT EXISTS idx_tenant_routing_lookup
            ON tenant_routing (channel, key);",
    )
}
