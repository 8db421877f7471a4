use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Call-lock acquisition exceeded its wait timeout (§4.4, §5).
    #[error("lock timeout for call {call_id}")]
    LockTimeout { call_id: String },

    #[error("call session not found: tenant={tenant_id} call_id={call_id}")]
    NotFound { tenant_id: i64, call_id: String },
}

pub type Result<T> = std::result::Result<T, JournalError>;

impl From<JournalError> for concierge_core::error::ConciergeError {
    fn from(e: JournalError) -> Self {
        match e {
            JournalError::Database(e) => concierge_core::error::ConciergeError::Database(e.to_string()),
            JournalError::Serialization(e) => concierge_core::error::ConciergeError::Serialization(e),
            JournalError::LockTimeout { call_id } => {
                concierge_core::error::ConciergeError::LockTimeout { call_id }
            }
            JournalError::NotFound { tenant_id, call_id } => {
                concierge_core::error::ConciergeError::Validation(format!(
                    "call session not found: tenant={tenant_id} call_id={call_id}"
                ))
            }
        }
    }
}
