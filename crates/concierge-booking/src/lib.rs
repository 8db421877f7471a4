pub mod error;
pub mod google;
pub mod none_provider;
pub mod provider;
pub mod types;

pub use error::{BookingError, Result};
pub use google::GoogleCalendarProvider;
pub use none_provider::NoneBookingProvider;
pub use provider::BookingProvider;
pub use types::{Booking, BookingOutcome, FindBookingResult, SlotQuery};
