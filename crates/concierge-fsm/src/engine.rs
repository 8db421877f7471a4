use std::str::FromStr;

use concierge_booking::BookingProvider;
use concierge_nlu::detect_emergency;
use concierge_sessions::Session;

use crate::handlers;
use crate::intents::detect_intent;
use crate::types::{FsmState, Intent, TurnOutcome};

pub const MAX_TURNS: u32 = 25;

/// Drives one user turn through the FSM contract (§4.8 step-by-step):
///
/// 1. empty/noise guard
/// 2. turn-count guard (anti-loop)
/// 3. emergency guard
/// 4. intent override (cancel/modify/transfer/faq)
/// 5. barge-in fast path while slots are being read aloud
/// 6. state handler dispatch
/// 7. post-processing — checkpoint/journal writes happen at the caller, this
///    only reports whether state changed so the caller knows to persist.
pub struct FsmEngine<'a> {
    booking: &'a dyn BookingProvider,
}

impl<'a> FsmEngine<'a> {
    pub fn new(booking: &'a dyn BookingProvider) -> Self {
        Self { booking }
    }

    pub async fn handle_turn(&self, session: &mut Session, text: &str) -> TurnOutcome {
        session.turn_count += 1;
        session.is_reading_slots = false;

        let current = FsmState::from_str(&session.state).unwrap_or(FsmState::Start);

        if current.is_terminal() {
            return TurnOutcome { reply: terminal_reply(current), state: current, state_changed: false };
        }

        // 1. empty/noise guard
        if text.trim().is_empty() {
            session.empty_message_count += 1;
            if session.empty_message_count >= concierge_sessions::types::MAX_EMPTY_MESSAGES {
                session.empty_message_count = 0;
                let outcome = handlers::enter_intent_router(session);
                return self.apply(session, outcome);
            }
            return TurnOutcome {
                reply: "Je n'ai rien entendu, pouvez-vous répéter ?".to_string(),
                state: current,
                state_changed: false,
            };
        }
        session.empty_message_count = 0;

        // 2. turn-count guard (anti-loop)
        if session.turn_count > MAX_TURNS {
            let outcome = handlers::enter_intent_router(session);
            return self.apply(session, outcome);
        }

        // 3. emergency guard
        if let Some(category) = detect_emergency(text) {
            tracing::warn!(
                event = concierge_core::audit::AuditEvent::MedicalRedFlagTriggered.as_str(),
                category = category.as_str(),
                conv_id = %session.conv_id,
                "emergency detected"
            );
            return TurnOutcome {
                reply: "Ceci ressemble à une urgence médicale. Raccrochez et appelez le 15 ou le 112 immédiatement.".to_string(),
                state: FsmState::Emergency,
                state_changed: true,
            };
        }

        // 4. intent override — cancel/modify/transfer/faq preempt the main line,
        // except while actively confirming a cancel/modify to avoid self-interrupting.
        if !matches!(current, FsmState::CancelConfirm | FsmState::ContactConfirm) {
            if let Some(intent) = detect_intent(text) {
                // Anti-loop: the same intent override twice in a row collapses
                // into a single acknowledgement, then routes to INTENT_ROUTER
                // instead of re-entering the same branch (§4.8 step 4).
                if session.last_intent.as_deref() == Some(intent.as_str()) {
                    let outcome = handlers::enter_intent_router(session);
                    return self.apply(session, outcome);
                }
                session.last_intent = Some(intent.as_str().to_string());
                match intent {
                    Intent::Cancel => {
                        return TurnOutcome {
                            reply: "Quel est le nom du rendez-vous à annuler ?".to_string(),
                            state: FsmState::CancelName,
                            state_changed: true,
                        };
                    }
                    Intent::Modify => {
                        return TurnOutcome {
                            reply: "Quel est le nom du rendez-vous à modifier ?".to_string(),
                            state: FsmState::ModifyName,
                            state_changed: true,
                        };
                    }
                    Intent::HumanTransfer => {
                        session.transfer_logged = true;
                        return TurnOutcome {
                            reply: "Je vous transfère à une personne du cabinet.".to_string(),
                            state: FsmState::Transferred,
                            state_changed: true,
                        };
                    }
                    Intent::FaqQuestion => {
                        let answer = handlers::handle_faq(text);
                        return TurnOutcome { reply: answer, state: current, state_changed: false };
                    }
                }
            }
        }

        // 5. barge-in fast path: if the previous turn just read slots aloud and
        // this utterance already resolves a choice, skip straight to confirm.
        if current == FsmState::WaitConfirm {
            if let Some(idx) = concierge_nlu::detect_slot_choice(text, &session.pending_slots, "fr") {
                if idx >= 1 && idx <= session.pending_slots.len() {
                    return self.apply(session, handlers::confirm_choice(session, idx));
                }
            }
        }

        // 6. state handler dispatch
        let outcome = match current {
            FsmState::Start | FsmState::Extract => handlers::handle_extract(text, session),
            FsmState::QualifName => handlers::handle_qualif_name(text, session),
            FsmState::QualifMotif => handlers::handle_qualif_motif(text, session),
            FsmState::QualifPref => handlers::handle_qualif_pref(text, session),
            FsmState::ProposeSlots => handlers::handle_propose_slots(session, self.booking).await,
            FsmState::WaitConfirm => handlers::handle_wait_confirm(text, session),
            FsmState::QualifContact => handlers::handle_qualif_contact(text, session),
            FsmState::ContactConfirm => handlers::handle_contact_confirm(text, session, self.booking).await,
            FsmState::Confirmed => handlers::handle_confirmed(session),
            FsmState::IntentRouter => handlers::handle_intent_router(text, session),
            FsmState::CancelName => handlers::handle_cancel_name(text, session, self.booking).await,
            FsmState::CancelConfirm => handlers::handle_cancel_confirm(text, session, self.booking).await,
            FsmState::ModifyName => handlers::handle_modify_name(text, session),
            FsmState::ModifySlotPick => handlers::handle_modify_slot_pick(text, session, self.booking).await,
            FsmState::Emergency | FsmState::Transferred => TurnOutcome {
                reply: terminal_reply(current),
                state: current,
                state_changed: false,
            },
            FsmState::FaqAnswer => TurnOutcome {
                reply: handlers::handle_faq(text),
                state: FsmState::Start,
                state_changed: true,
            },
        };

        self.apply(session, outcome)
    }

    fn apply(&self, session: &mut Session, outcome: TurnOutcome) -> TurnOutcome {
        if outcome.state_changed {
            session.state = outcome.state.to_string();
        }
        outcome
    }
}

fn terminal_reply(state: FsmState) -> String {
    match state {
        FsmState::Confirmed => "Votre rendez-vous est bien confirmé.".to_string(),
        FsmState::Emergency => "Raccrochez et appelez le 15 ou le 112 immédiatement.".to_string(),
        FsmState::Transferred => "Vous êtes en cours de transfert vers une personne du cabinet.".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_booking::NoneBookingProvider;
    use concierge_core::types::{Channel, TenantId};

    fn session() -> Session {
        Session::new("c1", TenantId::from(1), Channel::Voice, "2026-01-01T00:00:00Z".to_string())
    }

    #[tokio::test]
    async fn start_turn_asks_for_name() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        let outcome = engine.handle_turn(&mut s, "Bonjour").await;
        assert_eq!(outcome.state, FsmState::QualifName);
        assert_eq!(s.state, "QUALIF_NAME");
    }

    #[tokio::test]
    async fn emergency_keyword_short_circuits_to_emergency() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        let outcome = engine.handle_turn(&mut s, "j'ai une douleur thoracique").await;
        assert_eq!(outcome.state, FsmState::Emergency);
        assert!(outcome.state.is_terminal());
    }

    #[tokio::test]
    async fn terminal_state_re_emits_without_reprocessing() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        s.state = "CONFIRMED".to_string();
        let outcome = engine.handle_turn(&mut s, "merci").await;
        assert_eq!(outcome.state, FsmState::Confirmed);
        assert!(!outcome.state_changed);
    }

    #[tokio::test]
    async fn cancel_intent_preempts_qualification_flow() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        s.state = "QUALIF_MOTIF".to_string();
        let outcome = engine.handle_turn(&mut s, "je veux annuler mon rendez-vous").await;
        assert_eq!(outcome.state, FsmState::CancelName);
    }

    #[tokio::test]
    async fn turn_count_over_budget_routes_to_intent_router() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        s.turn_count = MAX_TURNS;
        let outcome = engine.handle_turn(&mut s, "bonjour encore").await;
        assert_eq!(outcome.state, FsmState::IntentRouter);
        assert_eq!(s.intent_router_visits, 1);
    }

    #[tokio::test]
    async fn second_intent_router_entry_in_a_call_transfers() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        s.turn_count = MAX_TURNS;
        engine.handle_turn(&mut s, "bonjour encore").await;

        s.turn_count = MAX_TURNS;
        let outcome = engine.handle_turn(&mut s, "et encore").await;
        assert_eq!(outcome.state, FsmState::Transferred);
        assert!(outcome.state.is_terminal());
    }

    #[tokio::test]
    async fn repeated_empty_messages_route_to_intent_router() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        engine.handle_turn(&mut s, "").await;
        let outcome = engine.handle_turn(&mut s, "").await;
        assert_eq!(outcome.state, FsmState::IntentRouter);
    }

    #[tokio::test]
    async fn repeated_identical_intent_override_routes_to_intent_router() {
        let provider = NoneBookingProvider;
        let engine = FsmEngine::new(&provider);
        let mut s = session();
        s.state = "QUALIF_MOTIF".to_string();
        engine.handle_turn(&mut s, "je veux annuler mon rendez-vous").await;
        assert_eq!(s.state, "CANCEL_NAME");

        s.state = "QUALIF_MOTIF".to_string();
        let outcome = engine.handle_turn(&mut s, "je veux annuler mon rendez-vous").await;
        assert_eq!(outcome.state, FsmState::IntentRouter);
    }
}
