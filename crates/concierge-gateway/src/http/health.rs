use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe. Always 200 once the process is serving.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /ready — readiness probe: can this instance reach its own tenant store.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.tenants.get_tenant(concierge_core::types::TenantId::from(0)) {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(concierge_tenants::TenantError::NotFound(_)) => {
            (StatusCode::OK, Json(json!({ "status": "ready" })))
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "error": e.to_string() })),
        ),
    }
}
