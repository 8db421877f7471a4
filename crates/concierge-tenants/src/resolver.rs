use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::instrument;

use concierge_core::types::{CalendarProvider, Channel, ConsentMode, Tenant, TenantId, TenantStatus};

use crate::error::{Result, TenantError};
use crate::types::{FlagSource, TenantFlags, FLAG_KEYS};

const FLAGS_CACHE_TTL: Duration = Duration::from_secs(60);

/// Resolves inbound identifiers (phone DID, WhatsApp number, API key) to a
/// tenant, and serves tenant configuration with a short TTL cache in front
/// of the DB (§4.1, §9 "tenant flags TTL cache").
pub struct TenantResolver {
    conn: Mutex<Connection>,
    flags_cache: Mutex<HashMap<i64, (Instant, TenantFlags)>>,
}

impl TenantResolver {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            flags_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Map an inbound channel identifier to a tenant (§4.1).
    #[instrument(skip(self), fields(channel = %channel))]
    pub fn resolve_by_inbound_number(&self, channel: Channel, raw_number: &str) -> Result<TenantId> {
        let normalized = normalize_e164(raw_number)
            .ok_or_else(|| TenantError::UnknownRoute(raw_number.to_string()))?;
        let conn = self.conn.lock().unwrap();
        let tenant_id: i64 = conn
            .query_row(
                "SELECT tenant_id FROM tenant_routing WHERE channel = ?1 AND key = ?2",
                params![channel.to_string(), normalized],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    TenantError::UnknownRoute(normalized.clone())
                }
                other => TenantError::Database(other),
            })?;
        Ok(TenantId::from(tenant_id))
    }

    /// Map a bearer API key to a tenant (used by the web-chat channel).
    #[instrument(skip(self, key))]
    pub fn resolve_by_api_key(&self, key: &str) -> Result<TenantId> {
        if key.is_empty() {
            return Err(TenantError::Unauthenticated("empty api key".to_string()));
        }
        let conn = self.conn.lock().unwrap();
        let tenant_id: i64 = conn
            .query_row(
                "SELECT tenant_id FROM tenant_routing WHERE channel = ?1 AND key = ?2",
                params![Channel::Web.to_string(), key],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    TenantError::Unauthenticated("unknown api key".to_string())
                }
                other => TenantError::Database(other),
            })?;
        Ok(TenantId::from(tenant_id))
    }

    #[instrument(skip(self))]
    pub fn get_tenant(&self, tenant_id: TenantId) -> Result<Tenant> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT tenant_id, display_name, timezone, status, calendar_provider,
                    calendar_id, business_name, transfer_phone, consent_mode
             FROM tenants WHERE tenant_id = ?1",
        )?;
        stmt.query_row(params![tenant_id.get()], row_to_tenant)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    TenantError::NotFound(tenant_id.to_string())
                }
                other => TenantError::Database(other),
            })
    }

    /// Register a routing entry. Idempotent via `INSERT OR REPLACE`.
    #[instrument(skip(self))]
    pub fn add_route(&self, channel: Channel, key: &str, tenant_id: TenantId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO tenant_routing (channel, key, tenant_id) VALUES (?1, ?2, ?3)",
            params![channel.to_string(), key, tenant_id.get()],
        )?;
        Ok(())
    }

    /// Effective feature flags for a tenant, defaults overlaid by DB
    /// overrides, served from a 60-second TTL cache.
    #[instrument(skip(self))]
    pub fn get_flags(&self, tenant_id: TenantId) -> Result<TenantFlags> {
        {
            let cache = self.flags_cache.lock().unwrap();
            if let Some((fetched_at, flags)) = cache.get(&tenant_id.get()) {
                if fetched_at.elapsed() < FLAGS_CACHE_TTL {
                    return Ok(flags.clone());
                }
            }
        }

        let conn = self.conn.lock().unwrap();
        let row: Option<String> = conn
            .query_row(
                "SELECT flags_json FROM tenant_config WHERE tenant_id = ?1",
                params![tenant_id.get()],
                |row| row.get(0),
            )
            .ok();
        drop(conn);

        let mut flags: HashMap<String, bool> =
            FLAG_KEYS.iter().map(|k| (k.to_string(), false)).collect();
        let source = if let Some(raw) = row {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(&raw) {
                for key in FLAG_KEYS {
                    if let Some(serde_json::Value::Bool(b)) = map.get(*key) {
                        flags.insert(key.to_string(), *b);
                    }
                }
                FlagSource::Db
            } else {
                FlagSource::Default
            }
        } else {
            FlagSource::Default
        };

        let resolved = TenantFlags {
            tenant_id,
            flags,
            source,
        };
        self.flags_cache
            .lock()
            .unwrap()
            .insert(tenant_id.get(), (Instant::now(), resolved.clone()));
        Ok(resolved)
    }

    /// Invalidate the cached flags for one tenant, e.g. right after an
    /// admin writes a new flags blob.
    pub fn invalidate_flags(&self, tenant_id: TenantId) {
        self.flags_cache.lock().unwrap().remove(&tenant_id.get());
    }

    /// Create a tenant row. Used by admin provisioning and tests.
    #[instrument(skip(self))]
    pub fn create_tenant(&self, tenant: &Tenant) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tenants
                (tenant_id, display_name, timezone, status, calendar_provider,
                 calendar_id, business_name, transfer_phone, consent_mode, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?10)",
            params![
                tenant.tenant_id.get(),
                tenant.display_name,
                tenant.timezone,
                tenant.status.to_string(),
                calendar_provider_str(tenant.calendar_provider),
                tenant.calendar_id,
                tenant.business_name,
                tenant.transfer_phone,
                consent_mode_str(tenant.consent_mode),
                now,
            ],
        )?;
        Ok(())
    }
}

fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
    let status_str: String = row.get(3)?;
    let provider_str: String = row.get(4)?;
    let consent_str: String = row.get(8)?;
    Ok(Tenant {
        tenant_id: TenantId::from(row.get::<_, i64>(0)?),
        display_name: row.get(1)?,
        timezone: row.get(2)?,
        status: parse_status(&status_str),
        calendar_provider: parse_provider(&provider_str),
        calendar_id: row.get(5)?,
        business_name: row.get(6)?,
        transfer_phone: row.get(7)?,
        consent_mode: parse_consent(&consent_str),
    })
}

fn parse_status(s: &str) -> TenantStatus {
    match s {
        "suspended" => TenantStatus::Suspended,
        _ => TenantStatus::Active,
    }
}

fn parse_provider(s: &str) -> CalendarProvider {
    match s {
        "google" => CalendarProvider::Google,
        _ => CalendarProvider::None,
    }
}

fn parse_consent(s: &str) -> ConsentMode {
    match s {
        "explicit" => ConsentMode::Explicit,
        _ => ConsentMode::Implicit,
    }
}

fn calendar_provider_str(p: CalendarProvider) -> &'static str {
    match p {
        CalendarProvider::Google => "google",
        CalendarProvider::None => "none",
    }
}

fn consent_mode_str(c: ConsentMode) -> &'static str {
    match c {
        ConsentMode::Implicit => "implicit",
        ConsentMode::Explicit => "explicit",
    }
}

/// Normalize an inbound phone identifier to E.164 (§4.1): strip
/// `whatsapp:`/`tel:`/`sip:` prefixes, strip whitespace/dashes/dots, fold a
/// leading `00` to `+`, require `+` followed by 8–15 digits.
pub fn normalize_e164(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    for prefix in ["whatsapp:", "tel:", "sip:"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
            break;
        }
    }
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect();
    let cleaned = if let Some(rest) = cleaned.strip_prefix("00") {
        format!("+{rest}")
    } else {
        cleaned
    };
    if !cleaned.starts_with('+') {
        return None;
    }
    let digits = &cleaned[1..];
    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whatsapp_prefix() {
        assert_eq!(
            normalize_e164("whatsapp:+33612345678"),
            Some("+33612345678".to_string())
        );
    }

    #[test]
    fn folds_leading_00_to_plus() {
        assert_eq!(normalize_e164("0033612345678"), Some("+33612345678".to_string()));
    }

    #[test]
    fn strips_dashes_dots_whitespace() {
        assert_eq!(
            normalize_e164("tel: +33 6.12-34 56 78"),
            Some("+33612345678".to_string())
        );
    }

    #[test]
    fn rejects_missing_plus() {
        assert_eq!(normalize_e164("33612345678"), None);
    }

    #[test]
    fn rejects_too_short() {
        assert_eq!(normalize_e164("+123456"), None);
    }

    #[test]
    fn rejects_too_long() {
        assert_eq!(normalize_e164("+1234567890123456"), None);
    }
}
