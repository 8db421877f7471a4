use thiserror::Error;

/// Error taxonomy for the booking engine (spec §7 ERROR HANDLING DESIGN).
///
/// Each variant corresponds to one row of the taxonomy table and, at the
/// gateway edge, maps to a concrete HTTP status.
#[derive(Debug, Error)]
pub enum ConciergeError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Transient I/O that exhausted its one retry (DB, calendar, payment call).
    #[error("transient failure after retry: {0}")]
    Transient(String),

    /// Malformed inbound webhook payload. No side effects must have occurred.
    #[error("validation failed: {0}")]
    Validation(String),

    /// HMAC/signature verification failed on an inbound webhook.
    #[error("signature verification failed: {0}")]
    SignatureFailure(String),

    /// Call-lock acquisition exceeded its 2s timeout (§4.4, §5).
    #[error("lock timeout for call {call_id}")]
    LockTimeout { call_id: String },

    /// A single-tenant-only code path was invoked while multi-tenant mode is on.
    #[error("multi-tenant boundary violation: {0}")]
    MultiTenantBoundary(String),

    /// A tenant or route could not be resolved from the inbound identifier.
    #[error("unknown route: {0}")]
    UnknownRoute(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Calendar provider reported the slot was already taken.
    #[error("slot taken")]
    SlotTaken,

    /// Calendar/payment provider denied the operation outright.
    #[error("permission denied by provider: {0}")]
    PermissionDenied(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConciergeError {
    /// Short error code, mirrored into structured logs and JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ConciergeError::Config(_) => "CONFIG_ERROR",
            ConciergeError::Transient(_) => "TRANSIENT",
            ConciergeError::Validation(_) => "VALIDATION",
            ConciergeError::SignatureFailure(_) => "SIGNATURE_FAILURE",
            ConciergeError::LockTimeout { .. } => "LOCK_TIMEOUT",
            ConciergeError::MultiTenantBoundary(_) => "MULTI_TENANT_BOUNDARY",
            ConciergeError::UnknownRoute(_) => "UNKNOWN_ROUTE",
            ConciergeError::Unauthenticated(_) => "UNAUTHENTICATED",
            ConciergeError::SlotTaken => "SLOT_TAKEN",
            ConciergeError::PermissionDenied(_) => "PERMISSION_DENIED",
            ConciergeError::Database(_) => "DATABASE_ERROR",
            ConciergeError::Serialization(_) => "SERIALIZATION_ERROR",
            ConciergeError::Io(_) => "IO_ERROR",
            ConciergeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// True if `message` looks like a transient, retry-worthy failure (§5, §7) —
/// matched against a short substring list rather than a broad catch-all.
pub fn is_transient_message(message: &str) -> bool {
    const TRANSIENT_SUBSTRINGS: &[&str] = &[
        "connection refused",
        "timeout",
        "timed out",
        "connection reset",
        "broken pipe",
        "temporarily unavailable",
    ];
    let lower = message.to_lowercase();
    TRANSIENT_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

pub type Result<T> = std::result::Result<T, ConciergeError>;
