//! Web chat endpoint — POST /v1/chat (§6).
//!
//! Auth: `Authorization: Bearer <tenant api key>`. The body is the same
//! `{"conv_id", "text"}` document `WebAdapter::parse_incoming` expects.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use std::sync::Arc;

use concierge_core::types::Channel;

use crate::app::AppState;
use crate::error::ApiError;

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, ApiError> {
    let token = extract_bearer(&headers)
        .ok_or_else(|| concierge_core::ConciergeError::Unauthenticated("missing bearer token".to_string()))?;
    let tenant_id = state.tenants.resolve_by_api_key(token)?;

    let adapter = state
        .channels
        .get("web")
        .expect("web adapter always registered");

    let Some(msg) = adapter.parse_incoming(&body)? else {
        return Ok(adapter.format_response(&concierge_channels::AgentReply {
            text: String::new(),
            state: "START".to_string(),
            conversation_id: String::new(),
        }));
    };
    debug_assert_eq!(msg.channel, Channel::Web);

    let reply = crate::pipeline::run_web_turn_for_tenant(&state, msg, Some(tenant_id)).await?;
    Ok(adapter.format_response(&reply))
}

pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
