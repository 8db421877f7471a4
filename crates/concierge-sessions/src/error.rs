use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested session does not exist.
    #[error("session not found: tenant={tenant_id} conv_id={conv_id}")]
    NotFound { tenant_id: i64, conv_id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored session JSON failed to deserialize into the current `Session` shape.
    #[error("session deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A single-tenant-only path was invoked while multi-tenant mode is on
    /// (§4.2): never silently serve the wrong tenant.
    #[error("multi-tenant boundary violation: {0}")]
    MultiTenantBoundary(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for concierge_core::error::ConciergeError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound { tenant_id, conv_id } => {
                concierge_core::error::ConciergeError::Validation(format!(
                    "session not found: tenant={tenant_id} conv_id={conv_id}"
                ))
            }
            SessionError::Database(e) => concierge_core::error::ConciergeError::Database(e.to_string()),
            SessionError::Serialization(e) => concierge_core::error::ConciergeError::Serialization(e),
            SessionError::MultiTenantBoundary(s) => {
                concierge_core::error::ConciergeError::MultiTenantBoundary(s)
            }
        }
    }
}
