//! End-to-end conversation flows through `FsmEngine`, exercising full turn
//! sequences rather than single handler calls (complements the per-handler
//! unit tests living alongside `src/`).

use std::sync::Mutex;

use async_trait::async_trait;

use concierge_booking::{Booking, BookingOutcome, BookingProvider, FindBookingResult, SlotQuery};
use concierge_core::types::{CanonicalSlot, Channel, SlotSource, TenantId};
use concierge_fsm::FsmEngine;
use concierge_fsm::FsmState;
use concierge_sessions::Session;

/// A booking provider whose slots and outcomes are scripted up front, so a
/// test can drive a full conversation without touching any real calendar.
struct FakeBookingProvider {
    slots: Vec<CanonicalSlot>,
    book_outcome: Mutex<BookingOutcome>,
    existing_booking: Option<Booking>,
    cancel_result: bool,
}

impl FakeBookingProvider {
    fn with_slots(slots: Vec<CanonicalSlot>) -> Self {
        Self {
            slots,
            book_outcome: Mutex::new(BookingOutcome::Booked {
                external_event_id: "evt-1".to_string(),
            }),
            existing_booking: None,
            cancel_result: true,
        }
    }
}

fn slot(n: u32) -> CanonicalSlot {
    CanonicalSlot {
        id: format!("slot-{n}"),
        start_iso: format!("2026-02-0{n}T09:00:00Z"),
        end_iso: format!("2026-02-0{n}T09:15:00Z"),
        label: format!("lundi {n} à 9h"),
        label_vocal: format!("lundi {n} à 9 heures"),
        day: "lundi".to_string(),
        source: SlotSource::Calendar,
    }
}

#[async_trait]
impl BookingProvider for FakeBookingProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_free_slots(&self, _query: &SlotQuery) -> concierge_booking::Result<Vec<CanonicalSlot>> {
        Ok(self.slots.clone())
    }

    async fn book(
        &self,
        _slot: &CanonicalSlot,
        _patient_name: &str,
        _patient_contact: &str,
        _motif: &str,
    ) -> concierge_booking::Result<BookingOutcome> {
        Ok(self.book_outcome.lock().unwrap().clone())
    }

    async fn find_booking_by_name(&self, _name: &str) -> concierge_booking::Result<FindBookingResult> {
        Ok(match &self.existing_booking {
            Some(b) => FindBookingResult::Found(b.clone()),
            None => FindBookingResult::NotFound,
        })
    }

    async fn cancel(&self, _booking: &Booking) -> concierge_booking::Result<bool> {
        Ok(self.cancel_result)
    }

    fn can_propose_slots(&self) -> bool {
        true
    }
}

fn session() -> Session {
    Session::new("call-1", TenantId::from(1), Channel::Voice, "2026-01-01T00:00:00Z".to_string())
}

/// Drives `text` through one turn and returns the reply string, for terser
/// assertions below.
async fn turn(engine: &FsmEngine<'_>, session: &mut Session, text: &str) -> String {
    engine.handle_turn(session, text).await.reply
}

#[tokio::test]
async fn full_booking_flow_reaches_confirmed() {
    let provider = FakeBookingProvider::with_slots(vec![slot(1), slot(2)]);
    let engine = FsmEngine::new(&provider);
    let mut s = session();

    turn(&engine, &mut s, "Bonjour").await;
    assert_eq!(s.state, "QUALIF_NAME");

    turn(&engine, &mut s, "Martin Dupont").await;
    assert_eq!(s.state, "QUALIF_MOTIF");

    turn(&engine, &mut s, "un détartrage").await;
    assert_eq!(s.state, "QUALIF_PREF");

    turn(&engine, &mut s, "le matin").await;
    assert_eq!(s.state, "PROPOSE_SLOTS");

    // handle_propose_slots ignores the text itself, it only needs a
    // non-empty turn to get past the empty/noise guard (step 1).
    let outcome = engine.handle_turn(&mut s, "d'accord").await;
    assert_eq!(outcome.state, FsmState::WaitConfirm);
    assert_eq!(s.pending_slots.len(), 2);

    turn(&engine, &mut s, "le premier").await;
    assert_eq!(s.state, "QUALIF_CONTACT");
    assert_eq!(s.pending_slot_choice, Some(1));

    turn(&engine, &mut s, "0612345678").await;
    assert_eq!(s.state, "CONTACT_CONFIRM");
    assert!(s.qualif.contact.is_some());

    let outcome = engine.handle_turn(&mut s, "oui").await;
    assert_eq!(outcome.state, FsmState::Confirmed);
    assert!(outcome.state.is_terminal());
    assert!(s.qualif.is_complete());
}

#[tokio::test]
async fn taken_slot_sends_caller_back_to_propose_slots() {
    let provider = FakeBookingProvider::with_slots(vec![slot(1)]);
    *provider.book_outcome.lock().unwrap() = BookingOutcome::Taken;
    let engine = FsmEngine::new(&provider);
    let mut s = session();

    turn(&engine, &mut s, "je m'appelle Martin").await;
    turn(&engine, &mut s, "pour un contrôle").await;
    turn(&engine, &mut s, "le matin").await;
    engine.handle_turn(&mut s, "d'accord").await;
    turn(&engine, &mut s, "1").await;
    turn(&engine, &mut s, "martin@example.com").await;
    let outcome = engine.handle_turn(&mut s, "oui").await;

    assert_eq!(outcome.state, FsmState::ProposeSlots);
    assert!(s.pending_slot_choice.is_none());
    assert!(s.is_reading_slots);
}

#[tokio::test]
async fn no_calendar_provider_transfers_instead_of_proposing_slots() {
    let provider = concierge_booking::NoneBookingProvider;
    let engine = FsmEngine::new(&provider);
    let mut s = session();

    turn(&engine, &mut s, "je m'appelle Martin").await;
    turn(&engine, &mut s, "pour un contrôle").await;
    let outcome = engine.handle_turn(&mut s, "le matin").await;

    assert_eq!(outcome.state, FsmState::Transferred);
    assert!(outcome.state.is_terminal());
}

#[tokio::test]
async fn cancel_flow_finds_and_cancels_existing_booking() {
    let mut provider = FakeBookingProvider::with_slots(vec![]);
    provider.existing_booking = Some(Booking {
        external_event_id: Some("evt-9".to_string()),
        label: "mardi 10h".to_string(),
        start_iso: "2026-02-03T10:00:00Z".to_string(),
        end_iso: "2026-02-03T10:15:00Z".to_string(),
    });
    let engine = FsmEngine::new(&provider);
    let mut s = session();
    s.state = "IDLE".to_string();

    let outcome = engine.handle_turn(&mut s, "je veux annuler mon rendez-vous").await;
    assert_eq!(outcome.state, FsmState::CancelName);

    let outcome = engine.handle_turn(&mut s, "Martin Dupont").await;
    assert_eq!(outcome.state, FsmState::CancelConfirm);
    assert!(s.pending_cancel_slot.is_some());

    let outcome = engine.handle_turn(&mut s, "oui").await;
    assert_eq!(outcome.state, FsmState::Start);
    assert!(s.pending_cancel_slot.is_none());
}

#[tokio::test]
async fn cancel_with_no_matching_booking_stays_in_cancel_name() {
    let provider = FakeBookingProvider::with_slots(vec![]);
    let engine = FsmEngine::new(&provider);
    let mut s = session();
    s.state = "CANCEL_NAME".to_string();

    let outcome = engine.handle_turn(&mut s, "Introuvable").await;
    assert_eq!(outcome.state, FsmState::CancelName);
    assert!(!outcome.state_changed);
}

#[tokio::test]
async fn repeated_unintelligible_names_escalate_to_transfer() {
    let provider = concierge_booking::NoneBookingProvider;
    let engine = FsmEngine::new(&provider);
    let mut s = session();
    s.state = "QUALIF_NAME".to_string();

    engine.handle_turn(&mut s, "1").await;
    engine.handle_turn(&mut s, "2").await;
    let outcome = engine.handle_turn(&mut s, "3").await;

    assert_eq!(outcome.state, FsmState::IntentRouter);
}
