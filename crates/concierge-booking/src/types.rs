use concierge_core::types::TimeOfDay;

/// Outcome of a `book` call (§4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked { external_event_id: String },
    Taken,
    PermissionDenied,
    TechnicalError,
}

/// An existing appointment surfaced by `find_booking_by_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub external_event_id: Option<String>,
    pub label: String,
    pub start_iso: String,
    pub end_iso: String,
}

/// Outcome of `find_booking_by_name` (§4.9, §4.8 CANCEL_CONFIRM).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindBookingResult {
    Found(Booking),
    NotFound,
    /// Tenant has `provider = none` — never attempt a fallback calendar.
    NoCalendarConnected,
}

/// Parameters narrowing a `list_free_slots` query.
#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub date: chrono::NaiveDate,
    pub duration_minutes: u32,
    pub window_start_hour: u32,
    pub window_end_hour: u32,
    pub limit: usize,
    pub preference: Option<TimeOfDay>,
}

impl Default for SlotQuery {
    fn default() -> Self {
        Self {
            date: chrono::Utc::now().date_naive(),
            duration_minutes: 15,
            window_start_hour: 9,
            window_end_hour: 18,
            limit: 3,
            preference: None,
        }
    }
}
