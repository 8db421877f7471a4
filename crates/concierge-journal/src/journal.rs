use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use crate::error::Result;
use crate::types::{CallSessionRow, CallStatus, Role};

/// Atomically increments and returns the next sequence number for `(tenant, call)`.
/// Creates the call-session row on first use. Gaps are forbidden within a call.
pub fn next_seq(conn: &Connection, tenant_id: i64, call_id: &str, now: &str) -> Result<i64> {
    ensure_call_session(conn, tenant_id, call_id, now)?;
    let seq: i64 = conn.query_row(
        "UPDATE call_sessions SET last_seq = last_seq + 1, updated_at = ?1
         WHERE tenant_id = ?2 AND call_id = ?3
         RETURNING last_seq",
        rusqlite::params![now, tenant_id, call_id],
        |row| row.get(0),
    )?;
    Ok(seq)
}

/// Persists a journal entry at `seq = next_seq` and returns that seq.
pub fn append_message(
    conn: &Connection,
    tenant_id: i64,
    call_id: &str,
    role: Role,
    text: &str,
    ts: &str,
) -> Result<i64> {
    let seq = next_seq(conn, tenant_id, call_id, ts)?;
    conn.execute(
        "INSERT INTO call_messages (tenant_id, call_id, seq, role, text, ts)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![tenant_id, call_id, seq, role.to_string(), text, ts],
    )?;
    Ok(seq)
}

/// Inserts a checkpoint; idempotent on conflict with the same `(tenant, call, seq)` key.
pub fn write_checkpoint(
    conn: &Connection,
    tenant_id: i64,
    call_id: &str,
    seq: i64,
    state_json: &str,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO call_state_checkpoints (tenant_id, call_id, seq, state_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (tenant_id, call_id, seq) DO NOTHING",
        rusqlite::params![tenant_id, call_id, seq, state_json, now],
    )?;
    Ok(())
}

/// Returns the most recent checkpoint for a call, if any.
pub fn load_latest_checkpoint(
    conn: &Connection,
    tenant_id: i64,
    call_id: &str,
) -> Result<Option<(i64, String)>> {
    let row = conn
        .query_row(
            "SELECT seq, state_json FROM call_state_checkpoints
             WHERE tenant_id = ?1 AND call_id = ?2
             ORDER BY seq DESC LIMIT 1",
            rusqlite::params![tenant_id, call_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(row)
}

/// Records the FSM's current state name on the call-session row. Does not
/// touch `last_seq` — callers pair this with `write_checkpoint` after a
/// state-changing turn.
pub fn set_last_state(conn: &Connection, tenant_id: i64, call_id: &str, state: &str, now: &str) -> Result<()> {
    conn.execute(
        "UPDATE call_sessions SET last_state = ?1, updated_at = ?2
         WHERE tenant_id = ?3 AND call_id = ?4",
        rusqlite::params![state, now, tenant_id, call_id],
    )?;
    Ok(())
}

pub fn ensure_call_session(conn: &Connection, tenant_id: i64, call_id: &str, now: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO call_sessions
         (tenant_id, call_id, status, last_state, last_seq, updated_at)
         VALUES (?1, ?2, 'active', 'START', 0, ?3)",
        rusqlite::params![tenant_id, call_id, now],
    )?;
    Ok(())
}

pub fn mark_ended(conn: &Connection, tenant_id: i64, call_id: &str, now: &str) -> Result<()> {
    conn.execute(
        "UPDATE call_sessions SET status = 'ended', updated_at = ?1
         WHERE tenant_id = ?2 AND call_id = ?3",
        rusqlite::params![now, tenant_id, call_id],
    )?;
    Ok(())
}

pub fn get_call_session(
    conn: &Connection,
    tenant_id: i64,
    call_id: &str,
) -> Result<Option<CallSessionRow>> {
    let row = conn
        .query_row(
            "SELECT tenant_id, call_id, status, last_state, last_seq, updated_at
             FROM call_sessions WHERE tenant_id = ?1 AND call_id = ?2",
            rusqlite::params![tenant_id, call_id],
            |row| {
                let status_str: String = row.get(2)?;
                Ok(CallSessionRow {
                    tenant_id: row.get(0)?,
                    call_id: row.get(1)?,
                    status: if status_str == "ended" {
                        CallStatus::Ended
                    } else {
                        CallStatus::Active
                    },
                    last_state: row.get(3)?,
                    last_seq: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Wraps a connection with the §4.3 failure policy: `append_message` and
/// `write_checkpoint` degrade to no-ops (logged) after one transient retry,
/// so an unreachable durable store never blocks FSM progression.
pub struct JournalStore {
    conn: Mutex<Connection>,
}

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

impl JournalStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Appends a user/agent turn. Returns `None` if the store is unreachable
    /// even after one retry — the caller continues serving the call from
    /// the in-memory session (at-least-once delivery, not at-most-once).
    pub fn append_message_or_degrade(
        &self,
        tenant_id: i64,
        call_id: &str,
        role: Role,
        text: &str,
        ts: &str,
    ) -> Option<i64> {
        let conn = self.conn.lock().unwrap();
        match append_message(&conn, tenant_id, call_id, role, text, ts) {
            Ok(seq) => Some(seq),
            Err(e) => {
                warn!(error = %e, %call_id, "journal append failed, retrying once");
                thread::sleep(RETRY_BACKOFF);
                match append_message(&conn, tenant_id, call_id, role, text, ts) {
                    Ok(seq) => Some(seq),
                    Err(e) => {
                        warn!(error = %e, %call_id, "journal append degraded to no-op");
                        None
                    }
                }
            }
        }
    }

    pub fn write_checkpoint_or_degrade(
        &self,
        tenant_id: i64,
        call_id: &str,
        seq: i64,
        state_json: &str,
        now: &str,
    ) -> bool {
        let conn = self.conn.lock().unwrap();
        if write_checkpoint(&conn, tenant_id, call_id, seq, state_json, now).is_ok() {
            return true;
        }
        warn!(%call_id, "checkpoint write failed, retrying once");
        thread::sleep(RETRY_BACKOFF);
        match write_checkpoint(&conn, tenant_id, call_id, seq, state_json, now) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, %call_id, "checkpoint write degraded to no-op");
                false
            }
        }
    }

    pub fn load_latest_checkpoint(&self, tenant_id: i64, call_id: &str) -> Result<Option<(i64, String)>> {
        let conn = self.conn.lock().unwrap();
        load_latest_checkpoint(&conn, tenant_id, call_id)
    }

    pub fn get_call_session(&self, tenant_id: i64, call_id: &str) -> Result<Option<CallSessionRow>> {
        let conn = self.conn.lock().unwrap();
        get_call_session(&conn, tenant_id, call_id)
    }

    pub fn mark_ended(&self, tenant_id: i64, call_id: &str, now: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        mark_ended(&conn, tenant_id, call_id, now)
    }

    pub fn set_last_state(&self, tenant_id: i64, call_id: &str, state: &str, now: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        set_last_state(&conn, tenant_id, call_id, state, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn sequence_is_monotonic_with_no_gaps() {
        let conn = conn();
        let a = append_message(&conn, 1, "call-1", Role::User, "hi", "t0").unwrap();
        let b = append_message(&conn, 1, "call-1", Role::Agent, "hello", "t1").unwrap();
        let c = append_message(&conn, 1, "call-1", Role::User, "book", "t2").unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn checkpoint_insert_is_idempotent_on_conflict() {
        let conn = conn();
        let seq = append_message(&conn, 1, "call-1", Role::User, "hi", "t0").unwrap();
        write_checkpoint(&conn, 1, "call-1", seq, "{\"state\":\"START\"}", "t0").unwrap();
        write_checkpoint(&conn, 1, "call-1", seq, "{\"state\":\"DIFFERENT\"}", "t0").unwrap();
        let (loaded_seq, state) = load_latest_checkpoint(&conn, 1, "call-1").unwrap().unwrap();
        assert_eq!(loaded_seq, seq);
        assert_eq!(state, "{\"state\":\"START\"}");
    }

    #[test]
    fn load_latest_checkpoint_returns_none_when_absent() {
        let conn = conn();
        assert!(load_latest_checkpoint(&conn, 1, "call-missing").unwrap().is_none());
    }

    #[test]
    fn sequences_are_independent_per_call() {
        let conn = conn();
        let a1 = append_message(&conn, 1, "call-a", Role::User, "hi", "t0").unwrap();
        let b1 = append_message(&conn, 1, "call-b", Role::User, "hi", "t0").unwrap();
        assert_eq!((a1, b1), (1, 1));
    }
}
