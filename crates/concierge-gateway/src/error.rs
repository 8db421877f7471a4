use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use concierge_core::ConciergeError;

/// Maps the shared error taxonomy onto concrete HTTP statuses (§7). Wraps
/// `ConciergeError` rather than implementing `IntoResponse` on it directly,
/// since that type lives in `concierge-core` and knows nothing of HTTP.
pub struct ApiError(pub ConciergeError);

impl From<ConciergeError> for ApiError {
    fn from(e: ConciergeError) -> Self {
        Self(e)
    }
}

impl From<concierge_channels::ChannelError> for ApiError {
    fn from(e: concierge_channels::ChannelError) -> Self {
        Self(e.into())
    }
}

impl From<concierge_tenants::TenantError> for ApiError {
    fn from(e: concierge_tenants::TenantError) -> Self {
        Self(e.into())
    }
}

impl From<concierge_sessions::SessionError> for ApiError {
    fn from(e: concierge_sessions::SessionError) -> Self {
        Self(e.into())
    }
}

impl From<concierge_journal::JournalError> for ApiError {
    fn from(e: concierge_journal::JournalError) -> Self {
        Self(e.into())
    }
}

impl From<concierge_billing::BillingError> for ApiError {
    fn from(e: concierge_billing::BillingError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ConciergeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ConciergeError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConciergeError::Validation(_) => StatusCode::BAD_REQUEST,
            ConciergeError::SignatureFailure(_) => StatusCode::UNAUTHORIZED,
            ConciergeError::LockTimeout { .. } => StatusCode::CONFLICT,
            ConciergeError::MultiTenantBoundary(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ConciergeError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            ConciergeError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ConciergeError::SlotTaken => StatusCode::CONFLICT,
            ConciergeError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ConciergeError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ConciergeError::Serialization(_) => StatusCode::BAD_REQUEST,
            ConciergeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ConciergeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(code = self.0.code(), "request failed: {}", self.0);
        (status, Json(json!({ "error": self.0.to_string(), "code": self.0.code() }))).into_response()
    }
}
