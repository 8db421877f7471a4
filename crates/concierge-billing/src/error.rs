use thiserror::Error;

/// Errors that can occur within the billing subsystem.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("http error talking to payment provider: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook signature validation failed")]
    InvalidSignature,

    #[error("malformed webhook payload: {0}")]
    Malformed(String),

    #[error("no billing record for tenant {0}")]
    UnknownTenant(String),
}

pub type Result<T> = std::result::Result<T, BillingError>;

impl From<BillingError> for concierge_core::error::ConciergeError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::InvalidSignature => {
                concierge_core::error::ConciergeError::SignatureFailure(e.to_string())
            }
            BillingError::Database(_) => {
                concierge_core::error::ConciergeError::Database(e.to_string())
            }
            other => concierge_core::error::ConciergeError::Validation(other.to_string()),
        }
    }
}
