use std::net::SocketAddr;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::info;

use concierge_billing::{BillingEngine, BillingQuotaSnapshots, HttpEmailSink, JournalMinutesSource, SqlTenantContact, StripeUsageSink};
use concierge_core::ConciergeConfig;
use concierge_journal::CallLock;
use concierge_sessions::SessionStore;
use concierge_tenants::TenantResolver;

mod app;
mod error;
mod http;
mod pipeline;
mod rate_limit;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concierge_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("CONCIERGE_CONFIG").ok();
    let config = ConciergeConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ConciergeConfig::default()
    });

    let db_path = config.database.path.clone();
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tenants_conn = Connection::open(&db_path)?;
    concierge_tenants::db::init_db(&tenants_conn)?;
    let tenants = TenantResolver::new(tenants_conn);

    let sessions_conn = Connection::open(&db_path)?;
    concierge_sessions::db::init_db(&sessions_conn)?;
    let sessions = SessionStore::new(sessions_conn, config.multi_tenant.enabled);

    let journal_path = journal_db_path(&config);
    concierge_journal::db::init_db(&Connection::open(&journal_path)?)?;
    let call_lock = CallLock::new(&journal_path);

    let billing_conn = Connection::open(&db_path)?;
    concierge_billing::db::init_db(&billing_conn)?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    spawn_billing_engine(&config, &db_path, &journal_path);

    let state = Arc::new(app::AppState::new(config, tenants, sessions, call_lock, billing_conn));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("concierge gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn journal_db_path(config: &ConciergeConfig) -> String {
    let path = std::path::Path::new(&config.database.path);
    let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    parent.join("journal.db").to_string_lossy().into_owned()
}

/// Spawns the billing engine's daily jobs (suspension, metered usage push,
/// quota alerts) as a background task. Runs against its own connections —
/// never shares the request-path `AppState::billing_db` mutex.
fn spawn_billing_engine(config: &ConciergeConfig, billing_db_path: &str, journal_db_path: &str) {
    let Some(api_secret_key) = config.payment.api_secret_key.clone() else {
        tracing::warn!("payment.api_secret_key not configured, billing engine disabled");
        return;
    };
    let billing_db_path = billing_db_path.to_string();
    let journal_db_path = journal_db_path.to_string();
    let email = config.email.clone();

    tokio::spawn(async move {
        let minutes_source = match JournalMinutesSource::open(&journal_db_path) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to open journal db for billing engine");
                return;
            }
        };
        let quota_snapshots = match BillingQuotaSnapshots::open(&billing_db_path) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to open billing db for quota snapshots");
                return;
            }
        };
        let tenant_contact = match SqlTenantContact::open(&billing_db_path) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to open billing db for tenant contacts");
                return;
            }
        };
        let engine_conn = match Connection::open(&billing_db_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to open billing db for engine");
                return;
            }
        };

        let usage_sink = StripeUsageSink::new(api_secret_key);
        let alert_sink = HttpEmailSink::new(
            email.api_key.unwrap_or_default(),
            email.api_base.unwrap_or_default(),
            email.from_email.unwrap_or_default(),
        );

        let engine = match BillingEngine::new(
            engine_conn,
            Box::new(usage_sink),
            Box::new(minutes_source),
            Box::new(quota_snapshots),
            Box::new(tenant_contact),
            Box::new(alert_sink),
            2, // §9 quota/suspension jobs run at 02:00 UTC, off business hours
        ) {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(error = %e, "failed to construct billing engine");
                return;
            }
        };

        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        engine.run(shutdown_rx).await;
    });
}
