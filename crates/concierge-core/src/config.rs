use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_CALL_LOCK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 8;

/// Top-level config (concierge.toml + CONCIERGE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConciergeConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub multi_tenant: MultiTenantConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    pub admin_api_token: Option<String>,
    pub jwt_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            admin_api_token: None,
            jwt_secret: None,
        }
    }
}

/// Where session/tenant/journal state is persisted.
///
/// Only the embedded (rusqlite) backend is actually implemented; the
/// `PG_*_URL` family and `USE_PG_*` flags are still recognized and
/// validated at load time so a misconfigured deployment fails loudly
/// at startup instead of silently running against the wrong store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    pub database_url: Option<String>,
    pub pg_tenants_url: Option<String>,
    pub pg_call_journal_url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            database_url: None,
            pg_tenants_url: None,
            pg_call_journal_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiTenantConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub use_pg_tenants: bool,
    #[serde(default)]
    pub use_pg_call_journal: bool,
}

impl Default for MultiTenantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_pg_tenants: false,
            use_pg_call_journal: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentConfig {
    pub api_secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub metered_price_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalendarConfig {
    pub google_credentials_path: Option<String>,
}

/// Transactional email provider used for quota-alert notifications (§9
/// "quota alert job"). Only a generic bearer-token HTTP API is assumed,
/// not any specific vendor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub from_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub voice: Option<VoiceChannelConfig>,
    pub whatsapp: Option<WhatsappChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceChannelConfig {
    pub shared_secret: Option<String>,
}

/// Twilio-style WhatsApp webhook validation secret (auth token used as the
/// HMAC-SHA1 key over URL + sorted form params).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsappChannelConfig {
    pub auth_token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.concierge/concierge.db", home)
}

impl ConciergeConfig {
    /// Load config from a TOML file with CONCIERGE_* env var overrides.
    ///
    /// Checks, in order:
    ///   1. Explicit path argument
    ///   2. ~/.concierge/concierge.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ConciergeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CONCIERGE_").split("_"))
            .extract()
            .map_err(|e| crate::error::ConciergeError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Fatal if a `USE_PG_*` flag is set without its matching URL — we never
    /// silently fall back to the embedded store when Postgres was requested.
    fn validate(&self) -> crate::error::Result<()> {
        if self.multi_tenant.use_pg_tenants
            && self.database.pg_tenants_url.is_none()
            && self.database.database_url.is_none()
        {
            return Err(crate::error::ConciergeError::Config(
                "USE_PG_TENANTS is set but neither PG_TENANTS_URL nor DATABASE_URL is configured"
                    .to_string(),
            ));
        }
        if self.multi_tenant.use_pg_call_journal
            && self.database.pg_call_journal_url.is_none()
            && self.database.database_url.is_none()
        {
            return Err(crate::error::ConciergeError::Config(
                "USE_PG_CALL_JOURNAL is set but neither PG_CALL_JOURNAL_URL nor DATABASE_URL is configured"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.concierge/concierge.toml", home)
}
