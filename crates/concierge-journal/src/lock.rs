use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use tracing::warn;

use crate::error::{JournalError, Result};
use crate::journal::ensure_call_session;

/// §4.4: wait timeout before a lock acquisition gives up and tells the
/// caller (the telephony bridge) to retry.
pub const CALL_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-call advisory lock backed by a dedicated connection holding an open
/// `BEGIN IMMEDIATE` transaction against the call-session row. Exactly one
/// webhook for a given `(tenant, call)` executes FSM transitions at a time.
pub struct CallLock {
    db_path: PathBuf,
}

impl CallLock {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Acquires the lock for `(tenant_id, call_id)`. The returned guard owns
    /// the locked connection; journal writes issued during the transition
    /// should go through [`CallLockGuard::connection`] so they join the same
    /// transaction and cannot deadlock against the lock they are held under.
    pub fn acquire(&self, tenant_id: i64, call_id: &str, now: &str) -> Result<CallLockGuard> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(CALL_LOCK_TIMEOUT)?;
        crate::db::init_db(&conn)?;

        if let Err(e) = conn.execute_batch("BEGIN IMMEDIATE") {
            warn!(error = %e, %call_id, tenant_id, "call lock acquisition timed out");
            return Err(JournalError::LockTimeout {
                call_id: call_id.to_string(),
            });
        }

        ensure_call_session(&conn, tenant_id, call_id, now)?;
        Ok(CallLockGuard {
            conn: Some(conn),
            committed: false,
            tenant_id,
            call_id: call_id.to_string(),
        })
    }
}

/// Holds the call lock for the lifetime of one FSM transition. Dropping
/// without calling [`commit`](CallLockGuard::commit) rolls the transaction
/// back — on process crash the connection closes and the lock releases with it.
pub struct CallLockGuard {
    conn: Option<Connection>,
    committed: bool,
    pub tenant_id: i64,
    pub call_id: String,
}

impl CallLockGuard {
    pub fn connection(&self) -> &Connection {
        self.conn.as_ref().expect("call lock connection already released")
    }

    /// Commits the transaction, releasing the lock and durably applying any
    /// journal writes issued through `connection()` during the transition.
    pub fn commit(mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.execute_batch("COMMIT")?;
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for CallLockGuard {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(conn) = self.conn.take() {
                let _ = conn.execute_batch("ROLLBACK");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_commit_releases_for_next_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let lock = CallLock::new(&path);

        let guard = lock.acquire(1, "call-1", "t0").unwrap();
        guard.commit().unwrap();

        let guard2 = lock.acquire(1, "call-1", "t1").unwrap();
        guard2.commit().unwrap();
    }

    #[test]
    fn dropped_guard_without_commit_rolls_back_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let lock = CallLock::new(&path);

        {
            let _guard = lock.acquire(1, "call-1", "t0").unwrap();
        }

        let guard2 = lock.acquire(1, "call-1", "t1").unwrap();
        guard2.commit().unwrap();
    }

    #[test]
    fn second_acquire_times_out_while_first_holds_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let lock = CallLock::new(&path);

        let _guard = lock.acquire(1, "call-1", "t0").unwrap();
        let err = lock.acquire(1, "call-1", "t1").unwrap_err();
        assert!(matches!(err, JournalError::LockTimeout { .. }));
    }
}
