//! Payment-provider webhook — POST /v1/payment/webhook (§6, C11).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;

pub async fn payment_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let secret = state
        .config
        .payment
        .webhook_secret
        .as_deref()
        .ok_or_else(|| concierge_core::ConciergeError::Config("payment.webhook_secret is not configured".to_string()))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| concierge_core::ConciergeError::SignatureFailure("missing Stripe-Signature header".to_string()))?;

    let conn = state.billing_db.lock().await;
    concierge_billing::handle_webhook(&conn, &body, signature, secret, Utc::now())?;
    Ok("ok")
}
