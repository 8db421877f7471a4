//! WhatsApp messaging-gateway webhook — POST /v1/whatsapp/webhook (§6).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;

pub async fn whatsapp_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, ApiError> {
    let adapter = state
        .channels
        .get("whatsapp")
        .ok_or_else(|| concierge_core::ConciergeError::Config("whatsapp channel is not configured".to_string()))?;

    let signature = headers.get("x-whatsapp-signature").and_then(|v| v.to_str().ok());
    if !adapter.validate(&body, signature) {
        return Err(concierge_core::ConciergeError::SignatureFailure("whatsapp signature mismatch".to_string()).into());
    }

    let Some(msg) = adapter.parse_incoming(&body)? else {
        return Ok(String::new());
    };

    let reply = crate::pipeline::run_web_turn(&state, msg).await?;
    Ok(adapter.format_response(&reply))
}
