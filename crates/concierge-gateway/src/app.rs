use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use rusqlite::Connection;

use concierge_booking::{BookingProvider, GoogleCalendarProvider, NoneBookingProvider};
use concierge_channels::{ChannelManager, VoiceAdapter, WebAdapter, WhatsappAdapter};
use concierge_core::types::{CalendarProvider, Tenant, TenantId};
use concierge_core::ConciergeConfig;
use concierge_journal::CallLock;
use concierge_sessions::SessionStore;
use concierge_tenants::TenantResolver;

use crate::rate_limit::RateLimiter;

/// Central shared state, passed as `Arc<AppState>` to every Axum handler.
pub struct AppState {
    pub config: ConciergeConfig,
    pub tenants: TenantResolver,
    pub sessions: SessionStore,
    /// Per-call advisory lock backing the voice channel's journal writes
    /// (§4.4). Non-voice channels never touch this.
    pub call_lock: CallLock,
    pub channels: ChannelManager,
    /// One booking provider per tenant, built lazily on first use and never
    /// shared across tenants (§4.9).
    booking_providers: DashMap<i64, Arc<dyn BookingProvider>>,
    /// Connection to the billing database, used only by the payment webhook
    /// handler (request-scoped, guarded by its own mutex).
    pub billing_db: tokio::sync::Mutex<Connection>,
    pub admin_rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        config: ConciergeConfig,
        tenants: TenantResolver,
        sessions: SessionStore,
        call_lock: CallLock,
        billing_db: Connection,
    ) -> Self {
        let mut channels = ChannelManager::new();
        channels.register(Box::new(VoiceAdapter));
        if let Some(whatsapp) = &config.channels.whatsapp {
            let secret = whatsapp.auth_token.clone().unwrap_or_default();
            let webhook_url = format!(
                "http://{}:{}/v1/whatsapp/webhook",
                config.gateway.bind, config.gateway.port
            );
            channels.register(Box::new(WhatsappAdapter::new(webhook_url, secret)));
        }
        channels.register(Box::new(WebAdapter));

        Self {
            config,
            tenants,
            sessions,
            call_lock,
            channels,
            booking_providers: DashMap::new(),
            billing_db: tokio::sync::Mutex::new(billing_db),
            admin_rate_limiter: RateLimiter::new(10, std::time::Duration::from_secs(60)),
        }
    }

    /// Returns the cached booking provider for a tenant, building it on
    /// first use from the tenant's configured calendar backend. A `none`
    /// tenant never falls back to a globally configured external calendar
    /// (§4.9).
    pub fn booking_provider_for(&self, tenant: &Tenant) -> concierge_core::Result<Arc<dyn BookingProvider>> {
        if let Some(existing) = self.booking_providers.get(&tenant.tenant_id.get()) {
            return Ok(existing.clone());
        }

        let provider: Arc<dyn BookingProvider> = match tenant.calendar_provider {
            CalendarProvider::Google => {
                let path = self
                    .config
                    .calendar
                    .google_credentials_path
                    .as_deref()
                    .ok_or_else(|| {
                        concierge_core::ConciergeError::Config(
                            "tenant uses google calendar but no google_credentials_path is configured".to_string(),
                        )
                    })?;
                let calendar_id = tenant.calendar_id.clone().ok_or_else(|| {
                    concierge_core::ConciergeError::Config(format!(
                        "tenant {} uses google calendar but has no calendar_id",
                        tenant.tenant_id
                    ))
                })?;
                Arc::new(GoogleCalendarProvider::from_file(path, calendar_id)?)
            }
            CalendarProvider::None => Arc::new(NoneBookingProvider),
        };

        self.booking_providers.insert(tenant.tenant_id.get(), provider.clone());
        Ok(provider)
    }

    pub fn get_tenant(&self, tenant_id: TenantId) -> concierge_core::Result<Tenant> {
        self.tenants.get_tenant(tenant_id).map_err(Into::into)
    }
}

/// Assemble the full Axum router (§6 EXTERNAL INTERFACES).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ready", get(crate::http::health::ready_handler))
        .route("/v1/chat", post(crate::http::chat::chat_handler))
        .route("/v1/voice/webhook", post(crate::http::voice_webhook::voice_webhook_handler))
        .route("/v1/whatsapp/webhook", post(crate::http::whatsapp_webhook::whatsapp_webhook_handler))
        .route("/v1/payment/webhook", post(crate::http::payment_webhook::payment_webhook_handler))
        .nest("/v1/admin", crate::http::admin::router())
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
