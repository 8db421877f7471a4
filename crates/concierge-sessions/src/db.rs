use rusqlite::Connection;

use crate::error::Result;

/// Initialize the `web_sessions` table and its index.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout. Voice
/// sessions are not persisted here; their authoritative store is the
/// journal+checkpoint log (`concierge-journal`).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS web_sessions (
            tenant_id     INTEGER NOT NULL,
            conv_id       TEXT NOT NULL,
            state_json    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            PRIMARY KEY (tenant_id, conv_id)
        );
        CREATE INDEX IF NOT EXISTS idx_web_sessions_updated
            ON web_sessions(updated_at);",
    )?;
    Ok(())
}
