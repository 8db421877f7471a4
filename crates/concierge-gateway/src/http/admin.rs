//! Admin tenant-provisioning surface — POST /v1/admin/* (§6, §9).
//!
//! Gated by a single static `ADMIN_API_TOKEN` bearer and rate-limited
//! per caller IP (§9 "auth rate limiting").

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use concierge_core::types::{CalendarProvider, Channel, ConsentMode, Tenant, TenantId, TenantStatus};

use crate::app::AppState;
use crate::error::ApiError;
use crate::http::chat::extract_bearer;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tenants", post(create_tenant))
        .route("/tenants/{tenant_id}/routes", post(add_route))
}

#[derive(Deserialize)]
struct CreateTenantRequest {
    tenant_id: i64,
    display_name: String,
    timezone: String,
    business_name: String,
    #[serde(default)]
    transfer_phone: Option<String>,
    #[serde(default)]
    calendar_provider: Option<String>,
    #[serde(default)]
    calendar_id: Option<String>,
    #[serde(default)]
    explicit_consent: bool,
}

async fn create_tenant(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<CreateTenantRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers, &addr)?;

    let tenant = Tenant {
        tenant_id: TenantId::from(req.tenant_id),
        display_name: req.display_name,
        timezone: req.timezone,
        status: TenantStatus::Active,
        calendar_provider: match req.calendar_provider.as_deref() {
            Some("google") => CalendarProvider::Google,
            _ => CalendarProvider::None,
        },
        calendar_id: req.calendar_id,
        business_name: req.business_name,
        transfer_phone: req.transfer_phone,
        consent_mode: if req.explicit_consent { ConsentMode::Explicit } else { ConsentMode::Implicit },
    };
    state.tenants.create_tenant(&tenant)?;
    Ok(Json(serde_json::json!({ "ok": true, "tenant_id": tenant.tenant_id.get() })))
}

#[derive(Deserialize)]
struct AddRouteRequest {
    channel: String,
    key: String,
}

async fn add_route(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    axum::extract::Path(tenant_id): axum::extract::Path<i64>,
    Json(req): Json<AddRouteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers, &addr)?;

    let channel = match req.channel.as_str() {
        "voice" => Channel::Voice,
        "whatsapp" => Channel::Whatsapp,
        "web" => Channel::Web,
        other => {
            return Err(concierge_core::ConciergeError::Validation(format!("unknown channel {other}")).into());
        }
    };
    state.tenants.add_route(channel, &req.key, TenantId::from(tenant_id))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

fn authorize(state: &AppState, headers: &HeaderMap, addr: &SocketAddr) -> Result<(), ApiError> {
    if !state.admin_rate_limiter.check(&addr.ip().to_string()) {
        return Err(concierge_core::ConciergeError::Validation("rate limit exceeded".to_string()).into());
    }

    let expected = state
        .config
        .gateway
        .admin_api_token
        .as_deref()
        .ok_or_else(|| concierge_core::ConciergeError::Config("admin_api_token is not configured".to_string()))?;
    let provided = extract_bearer(headers)
        .ok_or_else(|| concierge_core::ConciergeError::Unauthenticated("missing bearer token".to_string()))?;

    if provided != expected {
        return Err(concierge_core::ConciergeError::Unauthenticated("invalid admin token".to_string()).into());
    }
    Ok(())
}
