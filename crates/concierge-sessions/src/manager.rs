use dashmap::DashMap;
use rusqlite::{params, Connection};
use std::sync::Mutex;
use tracing::{debug, instrument};

use concierge_core::types::{Channel, TenantId};

use crate::error::{Result, SessionError};
use crate::types::Session;

/// Hybrid session store (C2, §4.2): a process-local cache in front of a
/// durable store, composed per the policy in §4.2:
///
/// - Web sessions: the durable `web_sessions` table is authoritative when
///   multi-tenant mode is on and reachable; the cache is write-through.
/// - Voice sessions: authoritative state lives in the journal+checkpoint
///   log (`concierge-journal`); this store only holds the live object for
///   the duration of the call.
pub struct SessionStore {
    db: Mutex<Connection>,
    cache: DashMap<(i64, String), Session>,
    multi_tenant_mode: bool,
}

impl SessionStore {
    pub fn new(conn: Connection, multi_tenant_mode: bool) -> Self {
        Self {
            db: Mutex::new(conn),
            cache: DashMap::new(),
            multi_tenant_mode,
        }
    }

    /// Return an existing session or create a fresh one.
    ///
    /// For web sessions, consults the durable store on a cache miss; for
    /// voice, a cache miss means the caller must reconstruct the session
    /// from the journal/checkpoint log instead (this store never invents
    /// voice-session state from nothing).
    #[instrument(skip(self), fields(tenant_id = tenant_id.get(), conv_id, channel = %channel))]
    pub fn get_or_create(&self, tenant_id: TenantId, conv_id: &str, channel: Channel) -> Result<Session> {
        if let Some(session) = self.get(tenant_id, conv_id)? {
            return Ok(session);
        }
        let now = chrono::Utc::now().to_rfc3339();
        let session = Session::new(conv_id, tenant_id, channel, now);
        self.save(&session)?;
        Ok(session)
    }

    /// Cache-first read, falling through to the durable `web_sessions`
    /// table for web-channel conversations.
    #[instrument(skip(self), fields(tenant_id = tenant_id.get(), conv_id))]
    pub fn get(&self, tenant_id: TenantId, conv_id: &str) -> Result<Option<Session>> {
        let cache_key = (tenant_id.get(), conv_id.to_string());
        if let Some(hit) = self.cache.get(&cache_key) {
            debug!("session cache hit");
            return Ok(Some(hit.clone()));
        }

        let db = self.db.lock().unwrap();
        let row: Option<String> = db
            .query_row(
                "SELECT state_json FROM web_sessions WHERE tenant_id = ?1 AND conv_id = ?2",
                params![tenant_id.get(), conv_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(SessionError::Database(other)),
            })?;
        drop(db);

        match row {
            Some(raw) => {
                let session: Session = serde_json::from_str(&raw)?;
                self.cache.insert(cache_key, session.clone());
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Upsert. Web-channel sessions write through to the durable store;
    /// voice-channel sessions only update the process-local cache (§4.2 —
    /// the journal+checkpoint log is authoritative for those).
    #[instrument(skip(self, session), fields(tenant_id = session.tenant_id.get(), conv_id = %session.conv_id))]
    pub fn save(&self, session: &Session) -> Result<()> {
        let cache_key = (session.tenant_id.get(), session.conv_id.clone());
        self.cache.insert(cache_key, session.clone());

        if session.channel == Channel::Web {
            let now = chrono::Utc::now().to_rfc3339();
            let blob = serde_json::to_string(session)?;
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO web_sessions (tenant_id, conv_id, state_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tenant_id, conv_id) DO UPDATE SET
                    state_json = excluded.state_json, updated_at = excluded.updated_at",
                params![session.tenant_id.get(), session.conv_id, blob, now],
            )?;
        }
        Ok(())
    }

    /// Purge both layers.
    #[instrument(skip(self), fields(tenant_id = tenant_id.get(), conv_id))]
    pub fn delete(&self, tenant_id: TenantId, conv_id: &str) -> Result<()> {
        self.cache.remove(&(tenant_id.get(), conv_id.to_string()));
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM web_sessions WHERE tenant_id = ?1 AND conv_id = ?2",
            params![tenant_id.get(), conv_id],
        )?;
        Ok(())
    }

    /// Guard for single-tenant-only helper paths: fails loudly rather than
    /// silently serving the wrong tenant when multi-tenant mode is on
    /// (§4.2, §7 error taxonomy).
    pub fn require_single_tenant_path(&self, path_name: &str) -> Result<()> {
        if self.multi_tenant_mode {
            return Err(SessionError::MultiTenantBoundary(format!(
                "{path_name} is single-tenant-only but multi-tenant mode is on"
            )));
        }
        Ok(())
    }

    /// Drop any cache entries whose `last_seen_at` has exceeded the session
    /// TTL. Intended to run from a periodic maintenance task.
    pub fn evict_expired(&self, now: chrono::DateTime<chrono::Utc>) {
        self.cache.retain(|_, session| !session.is_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::types::Channel;

    fn store() -> SessionStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionStore::new(conn, false)
    }

    #[test]
    fn get_or_create_then_get_round_trips() {
        let store = store();
        let tid = TenantId::from(1);
        let created = store.get_or_create(tid, "conv-1", Channel::Web).unwrap();
        assert_eq!(created.state, "START");
        let fetched = store.get(tid, "conv-1").unwrap().unwrap();
        assert_eq!(fetched.conv_id, "conv-1");
    }

    #[test]
    fn save_persists_web_sessions_across_cache_eviction() {
        let store = store();
        let tid = TenantId::from(1);
        let mut session = store.get_or_create(tid, "conv-2", Channel::Web).unwrap();
        session.state = "QUALIF_NAME".to_string();
        store.save(&session).unwrap();
        store.cache.remove(&(tid.get(), "conv-2".to_string()));
        let reloaded = store.get(tid, "conv-2").unwrap().unwrap();
        assert_eq!(reloaded.state, "QUALIF_NAME");
    }

    #[test]
    fn voice_sessions_do_not_write_through() {
        let store = store();
        let tid = TenantId::from(1);
        let session = store.get_or_create(tid, "call-1", Channel::Voice).unwrap();
        store.save(&session).unwrap();
        let db = store.db.lock().unwrap();
        let count: i64 = db
            .query_row(
                "SELECT COUNT(*) FROM web_sessions WHERE conv_id = 'call-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn single_tenant_path_rejected_in_multi_tenant_mode() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let store = SessionStore::new(conn, true);
        assert!(store.require_single_tenant_path("legacy_admin_tool").is_err());
    }
}
