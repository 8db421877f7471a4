use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("calendar provider credentials invalid: {0}")]
    Credentials(String),

    #[error("calendar provider response could not be parsed: {0}")]
    Parse(String),

    #[error("calendar provider denied the operation: {0}")]
    PermissionDenied(String),
}

pub type Result<T> = std::result::Result<T, BookingError>;

impl From<BookingError> for concierge_core::error::ConciergeError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::Http(e) => concierge_core::error::ConciergeError::Internal(e.to_string()),
            BookingError::Credentials(msg) => concierge_core::error::ConciergeError::Internal(msg),
            BookingError::Parse(msg) => concierge_core::error::ConciergeError::Internal(msg),
            BookingError::PermissionDenied(msg) => {
                concierge_core::error::ConciergeError::PermissionDenied(msg)
            }
        }
    }
}
