use rusqlite::Connection;

use crate::error::Result;

/// Initialize the journal/checkpoint/call-session schema. Idempotent —
/// safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS call_sessions (
            tenant_id   INTEGER NOT NULL,
            call_id     TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'active',
            last_state  TEXT NOT NULL DEFAULT 'START',
            last_seq    INTEGER NOT NULL DEFAULT 0,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (tenant_id, call_id)
        );

        CREATE TABLE IF NOT EXISTS call_messages (
            tenant_id   INTEGER NOT NULL,
            call_id     TEXT NOT NULL,
            seq         INTEGER NOT NULL,
            role        TEXT NOT NULL,
            text        TEXT NOT NULL,
            ts          TEXT NOT NULL,
            PRIMARY KEY (tenant_id, call_id, seq)
        );

        CREATE TABLE IF NOT EXISTS call_state_checkpoints (
            tenant_id   INTEGER NOT NULL,
            call_id     TEXT NOT NULL,
            seq         INTEGER NOT NULL,
            state_json  TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (tenant_id, call_id, seq)
        );

        CREATE INDEX IF NOT EXISTS idx_call_state_checkpoints_latest
            ON call_state_checkpoints (tenant_id, call_id, seq DESC);",
    )?;
    Ok(())
}
