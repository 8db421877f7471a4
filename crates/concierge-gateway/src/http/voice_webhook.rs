//! Voice telephony-bridge webhook — POST /v1/voice/webhook (§6).

use axum::body::Bytes;
use axum::extract::State;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;

pub async fn voice_webhook_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<String, ApiError> {
    let adapter = state
        .channels
        .get("voice")
        .expect("voice adapter always registered");

    if !adapter.validate(&body, None) {
        return Err(concierge_core::ConciergeError::SignatureFailure("voice webhook validation failed".to_string()).into());
    }

    let Some(msg) = adapter.parse_incoming(&body)? else {
        return Ok(r#"{"results":[]}"#.to_string());
    };

    let reply = crate::pipeline::run_voice_turn(&state, msg).await?;
    Ok(adapter.format_response(&reply))
}
