use async_trait::async_trait;
use concierge_core::types::CanonicalSlot;

use crate::error::Result;
use crate::types::{Booking, BookingOutcome, FindBookingResult, SlotQuery};

/// Per-tenant calendar adapter (C9, §4.9). Selected once per session from
/// tenant configuration; a `none` tenant must never fall back to a
/// globally configured external calendar.
#[async_trait]
pub trait BookingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn list_free_slots(&self, query: &SlotQuery) -> Result<Vec<CanonicalSlot>>;

    async fn book(
        &self,
        slot: &CanonicalSlot,
        patient_name: &str,
        patient_contact: &str,
        motif: &str,
    ) -> Result<BookingOutcome>;

    async fn find_booking_by_name(&self, name: &str) -> Result<FindBookingResult>;

    async fn cancel(&self, booking: &Booking) -> Result<bool>;

    /// `false` for the `none` provider — gates whether the FSM may even
    /// enter `PROPOSE_SLOTS`.
    fn can_propose_slots(&self) -> bool;
}
