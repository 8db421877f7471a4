use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsmError {
    #[error("booking adapter error: {0}")]
    Booking(#[from] concierge_booking::BookingError),
}

pub type Result<T> = std::result::Result<T, FsmError>;

impl From<FsmError> for concierge_core::error::ConciergeError {
    fn from(e: FsmError) -> Self {
        match e {
            FsmError::Booking(e) => e.into(),
        }
    }
}
