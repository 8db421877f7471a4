use async_trait::async_trait;
use concierge_core::types::CanonicalSlot;

use crate::error::Result;
use crate::provider::BookingProvider;
use crate::types::{Booking, BookingOutcome, FindBookingResult, SlotQuery};

/// `provider = none`: no calendar connected. Never proposes slots, never
/// books, and never claims a cancellation that did not occur — callers
/// route to human transfer on any of these.
pub struct NoneBookingProvider;

#[async_trait]
impl BookingProvider for NoneBookingProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn list_free_slots(&self, _query: &SlotQuery) -> Result<Vec<CanonicalSlot>> {
        Ok(Vec::new())
    }

    async fn book(
        &self,
        _slot: &CanonicalSlot,
        _patient_name: &str,
        _patient_contact: &str,
        _motif: &str,
    ) -> Result<BookingOutcome> {
        Ok(BookingOutcome::TechnicalError)
    }

    async fn find_booking_by_name(&self, _name: &str) -> Result<FindBookingResult> {
        Ok(FindBookingResult::NoCalendarConnected)
    }

    async fn cancel(&self, _booking: &Booking) -> Result<bool> {
        Ok(false)
    }

    fn can_propose_slots(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_proposes_slots() {
        let provider = NoneBookingProvider;
        assert!(!provider.can_propose_slots());
        assert!(provider.list_free_slots(&SlotQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_and_cancel_signal_no_calendar_connected() {
        let provider = NoneBookingProvider;
        assert_eq!(
            provider.find_booking_by_name("Martin").await.unwrap(),
            FindBookingResult::NoCalendarConnected
        );
        let booking = Booking {
            external_event_id: None,
            label: "".into(),
            start_iso: "".into(),
            end_iso: "".into(),
        };
        assert!(!provider.cancel(&booking).await.unwrap());
    }
}
