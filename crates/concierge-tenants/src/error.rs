use thiserror::Error;

/// Tenant-layer errors. Kept separate from `ConciergeError` so the resolver
/// can be unit tested without depending on the gateway's error taxonomy;
/// the gateway converts these at its boundary.
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("no tenant routes to {0}")]
    UnknownRoute(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("tenant not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, TenantError>;

impl From<TenantError> for concierge_core::error::ConciergeError {
    fn from(e: TenantError) -> Self {
        match e {
            TenantError::UnknownRoute(s) => concierge_core::error::ConciergeError::UnknownRoute(s),
            TenantError::Unauthenticated(s) => {
                concierge_core::error::ConciergeError::Unauthenticated(s)
            }
            TenantError::NotFound(s) => concierge_core::error::ConciergeError::UnknownRoute(s),
            TenantError::Database(e) => concierge_core::error::ConciergeError::Database(e.to_string()),
        }
    }
}
