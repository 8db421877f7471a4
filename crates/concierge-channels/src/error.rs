use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("malformed request body: {0}")]
    Malformed(String),

    #[error("signature validation failed")]
    InvalidSignature,

    #[error("missing shared secret for channel {0}")]
    MissingSecret(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

impl From<ChannelError> for concierge_core::error::ConciergeError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::InvalidSignature => {
                concierge_core::error::ConciergeError::SignatureFailure(e.to_string())
            }
            other => concierge_core::error::ConciergeError::Validation(other.to_string()),
        }
    }
}
