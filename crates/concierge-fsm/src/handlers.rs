use std::sync::OnceLock;

use concierge_booking::{BookingOutcome, BookingProvider, FindBookingResult, SlotQuery};
use concierge_core::types::{ContactKind, TimeOfDay};
use concierge_nlu::detect_slot_choice;
use concierge_sessions::Session;
use regex::Regex;
use serde_json::Value;

use crate::guards::should_escalate;
use crate::types::{FsmState, TurnOutcome};

/// Menu utterance shown on entry into `INTENT_ROUTER` (§4.8 step 1/2 guards
/// and the handler's own fallback all present this same menu).
pub const ROUTER_MENU: &str =
    "Voici ce que je peux faire : prendre un rendez-vous, annuler, modifier, parler à une personne, ou répondre à une question.";

fn reply(text: impl Into<String>, state: FsmState) -> TurnOutcome {
    TurnOutcome { reply: text.into(), state, state_changed: true }
}

fn stay(text: impl Into<String>, state: FsmState) -> TurnOutcome {
    TurnOutcome { reply: text.into(), state, state_changed: false }
}

/// Routes into `INTENT_ROUTER`, from any of its entry points (empty/noise
/// guard, turn-count guard, repeated intent override, or an unrecognized
/// reply to the menu itself). A second entry within the same call ends the
/// call to human transfer (§4.8).
pub fn enter_intent_router(session: &mut Session) -> TurnOutcome {
    session.intent_router_visits += 1;
    if session.intent_router_visits > 1 {
        session.transfer_logged = true;
        reply("Je vous transfère à une personne du cabinet.", FsmState::Transferred)
    } else {
        reply(ROUTER_MENU, FsmState::IntentRouter)
    }
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)je m'appelle ([a-zàâäéèêëïîôöùûüç\-\s]+)").unwrap())
}

fn motif_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)pour (une |un |la |le )?(.+)").unwrap())
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap())
}

pub fn handle_extract(text: &str, session: &mut Session) -> TurnOutcome {
    if let Some(caps) = name_re().captures(text) {
        session.qualif.name = Some(caps[1].trim().to_string());
    }
    if let Some(caps) = motif_re().captures(text) {
        session.qualif.motif = Some(caps[2].trim().to_string());
    }
    match (&session.qualif.name, &session.qualif.motif) {
        (Some(_), Some(_)) => reply("Quand souhaitez-vous votre rendez-vous ? Plutôt le matin, l'après-midi ou le soir ?", FsmState::QualifPref),
        (Some(_), None) => reply("Quel est le motif de votre rendez-vous ?", FsmState::QualifMotif),
        _ => reply("Bonjour, quel est votre nom ?", FsmState::QualifName),
    }
}

pub fn handle_qualif_name(text: &str, session: &mut Session) -> TurnOutcome {
    let candidate = text.trim();
    if candidate.is_empty() || candidate.chars().all(|c| c.is_ascii_digit()) {
        let fails = session.recovery.inc("name.fails", 1);
        if should_escalate(session, "name") {
            return reply("Je vous mets en relation avec une personne du cabinet.", FsmState::IntentRouter);
        }
        return stay(format!("Je n'ai pas bien compris votre nom ({fails}/3), pouvez-vous le répéter ?"), FsmState::QualifName);
    }
    session.qualif.name = Some(candidate.to_string());
    session.recovery.reset("name");
    reply("Quel est le motif de votre rendez-vous ?", FsmState::QualifMotif)
}

pub fn handle_qualif_motif(text: &str, session: &mut Session) -> TurnOutcome {
    let candidate = text.trim();
    if candidate.is_empty() {
        return stay("Pouvez-vous préciser le motif de votre rendez-vous ?", FsmState::QualifMotif);
    }
    session.qualif.motif = Some(candidate.to_string());
    reply("Plutôt le matin, l'après-midi ou le soir ?", FsmState::QualifPref)
}

pub fn handle_qualif_pref(text: &str, session: &mut Session) -> TurnOutcome {
    let locale = concierge_core::locale::locale_for("fr");
    let t = text.to_lowercase();
    let preference = locale
        .time_of_day
        .iter()
        .find(|(kw, _)| t.contains(kw))
        .map(|(_, pref)| *pref);
    session.qualif.preference = preference;
    session.pending_preference = preference.or(Some(TimeOfDay::Any));
    reply("Un instant, je regarde les créneaux disponibles.", FsmState::ProposeSlots)
}

pub async fn handle_propose_slots(session: &mut Session, booking: &dyn BookingProvider) -> TurnOutcome {
    if !booking.can_propose_slots() {
        return reply(
            "Je n'ai malheureusement pas accès à l'agenda pour le moment, je vous mets en relation avec le cabinet.",
            FsmState::Transferred,
        );
    }
    let query = SlotQuery {
        preference: session.pending_preference,
        ..SlotQuery::default()
    };
    let slots = booking.list_free_slots(&query).await.unwrap_or_default();
    if slots.is_empty() {
        return reply(
            "Je ne trouve pas de créneau correspondant, je vous transfère au cabinet.",
            FsmState::Transferred,
        );
    }
    session.pending_slots = slots;
    session.pending_slot_choice = None;
    session.is_reading_slots = true;
    let listing = session
        .pending_slots
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}: {}", i + 1, s.label_vocal))
        .collect::<Vec<_>>()
        .join(", ");
    reply(format!("Voici les créneaux disponibles — {listing}. Lequel vous convient ?"), FsmState::WaitConfirm)
}

pub fn handle_wait_confirm(text: &str, session: &mut Session) -> TurnOutcome {
    match detect_slot_choice(text, &session.pending_slots, "fr") {
        Some(idx) if idx >= 1 && idx <= session.pending_slots.len() => confirm_choice(session, idx),
        _ => {
            let fails = session.recovery.inc("slot_choice.fails", 1);
            if should_escalate(session, "slot_choice") {
                return reply("Je vous mets en relation avec une personne du cabinet.", FsmState::IntentRouter);
            }
            stay(
                format!("Je n'ai pas compris votre choix ({fails}/3). Répondez par exemple \"1\", \"2\" ou \"3\"."),
                FsmState::WaitConfirm,
            )
        }
    }
}

pub fn confirm_choice(session: &mut Session, idx: usize) -> TurnOutcome {
    session.pending_slot_choice = Some(idx);
    session.is_reading_slots = false;
    session.recovery.reset("slot_choice");
    reply("Très bien. Quel est le meilleur moyen de vous contacter, email ou téléphone ?", FsmState::QualifContact)
}

pub fn handle_qualif_contact(text: &str, session: &mut Session) -> TurnOutcome {
    if let Some(m) = email_re().find(text) {
        session.qualif.contact = Some(m.as_str().to_string());
        session.qualif.contact_kind = Some(ContactKind::Email);
        session.recovery.reset("contact");
        return reply(format!("Je confirme cet email : {}. C'est bien ça ?", m.as_str()), FsmState::ContactConfirm);
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        let mut partial = session.recovery.get_str("phone.partial");
        partial.push_str(&digits);
        session.recovery.set("phone.partial", Value::from(partial.clone()));
        session.recovery.inc("phone.turns", 1);
        if partial.len() >= 10 {
            let phone = partial[partial.len() - 10..].to_string();
            session.qualif.contact = Some(phone.clone());
            session.qualif.contact_kind = Some(ContactKind::Phone);
            session.recovery.reset("contact");
            session.recovery.reset("phone");
            return reply(format!("Je confirme ce numéro : {phone}. C'est bien ça ?"), FsmState::ContactConfirm);
        }
        return stay("Merci, pouvez-vous continuer à me donner votre numéro ?", FsmState::QualifContact);
    }

    let fails = session.recovery.inc("contact.fails", 1);
    if should_escalate(session, "contact") {
        session.recovery.set("contact.mode", Value::from("unresolved"));
        return reply(
            "Je n'arrive pas à récupérer vos coordonnées, je vous transfère au cabinet.",
            FsmState::Transferred,
        );
    }
    stay(
        format!("Je n'ai pas compris ({fails}/3). Donnez-moi un email ou un numéro de téléphone."),
        FsmState::QualifContact,
    )
}

pub async fn handle_contact_confirm(text: &str, session: &mut Session, booking: &dyn BookingProvider) -> TurnOutcome {
    let locale = concierge_core::locale::locale_for("fr");
    let t = text.trim().to_lowercase();
    let confirmed = detect_slot_choice(text, &[], "fr") == Some(1) || locale.bare_affirmations.contains(&t.as_str());

    if !confirmed {
        let repeats = session.recovery.inc("confirm_contact.intent_repeat", 1);
        if repeats >= 3 {
            return reply("Je vous transfère à une personne du cabinet.", FsmState::Transferred);
        }
        session.qualif.contact = None;
        session.qualif.contact_kind = None;
        return stay("D'accord, reprenons : quel est le meilleur moyen de vous contacter ?", FsmState::QualifContact);
    }

    let Some(idx) = session.pending_slot_choice else {
        return reply("Je ne retrouve plus le créneau choisi, je vous transfère au cabinet.", FsmState::Transferred);
    };
    let Some(slot) = session.pending_slots.get(idx - 1).cloned() else {
        return reply("Je ne retrouve plus le créneau choisi, je vous transfère au cabinet.", FsmState::Transferred);
    };
    let name = session.qualif.name.clone().unwrap_or_default();
    let contact = session.qualif.contact.clone().unwrap_or_default();
    let motif = session.qualif.motif.clone().unwrap_or_default();

    match booking.book(&slot, &name, &contact, &motif).await {
        Ok(BookingOutcome::Booked { .. }) => reply("Parfait, je confirme votre rendez-vous.", FsmState::Confirmed),
        Ok(BookingOutcome::Taken) => {
            session.pending_slot_choice = None;
            session.is_reading_slots = true;
            reply("Ce créneau vient d'être pris, je vous propose d'en choisir un autre.", FsmState::ProposeSlots)
        }
        Ok(BookingOutcome::PermissionDenied) | Ok(BookingOutcome::TechnicalError) | Err(_) => {
            reply("Je n'arrive pas à confirmer la réservation, je vous transfère au cabinet.", FsmState::Transferred)
        }
    }
}

pub fn handle_confirmed(session: &Session) -> TurnOutcome {
    let _ = session;
    stay("Votre rendez-vous est bien confirmé. Y a-t-il autre chose ?", FsmState::Confirmed)
}

pub fn handle_intent_router(text: &str, session: &mut Session) -> TurnOutcome {
    match text.to_lowercase().as_str() {
        t if t.contains("annuler") => reply("Quel est le nom du rendez-vous à annuler ?", FsmState::CancelName),
        t if t.contains("modifier") => reply("Quel est le nom du rendez-vous à modifier ?", FsmState::ModifyName),
        t if t.contains("personne") || t.contains("humain") => {
            session.transfer_logged = true;
            reply("Je vous transfère à une personne du cabinet.", FsmState::Transferred)
        }
        _ => enter_intent_router(session),
    }
}

pub async fn handle_cancel_name(text: &str, session: &mut Session, booking: &dyn BookingProvider) -> TurnOutcome {
    let name = text.trim();
    if name.is_empty() {
        return stay("Pouvez-vous me redonner le nom du rendez-vous ?", FsmState::CancelName);
    }
    match booking.find_booking_by_name(name).await {
        Ok(FindBookingResult::Found(b)) => {
            session.pending_cancel_slot = Some(concierge_sessions::PendingCancelSlot {
                slot: concierge_core::types::CanonicalSlot {
                    id: b.external_event_id.clone().unwrap_or_default(),
                    start_iso: b.start_iso.clone(),
                    end_iso: b.end_iso.clone(),
                    label: b.label.clone(),
                    label_vocal: b.label.clone(),
                    day: String::new(),
                    source: concierge_core::types::SlotSource::Calendar,
                },
                external_event_id: b.external_event_id,
            });
            reply(format!("Je trouve un rendez-vous : {}. Confirmez-vous l'annulation ?", b.label), FsmState::CancelConfirm)
        }
        Ok(FindBookingResult::NotFound) => stay("Je ne trouve pas de rendez-vous à ce nom, pouvez-vous vérifier ?", FsmState::CancelName),
        Ok(FindBookingResult::NoCalendarConnected) | Err(_) => {
            reply("Je ne peux pas accéder à l'agenda, je vous transfère au cabinet.", FsmState::Transferred)
        }
    }
}

pub async fn handle_cancel_confirm(text: &str, session: &mut Session, booking: &dyn BookingProvider) -> TurnOutcome {
    let locale = concierge_core::locale::locale_for("fr");
    let t = text.trim().to_lowercase();
    if !locale.bare_affirmations.contains(&t.as_str()) && detect_slot_choice(text, &[], "fr") != Some(1) {
        session.pending_cancel_slot = None;
        return stay("D'accord, je n'annule rien. Autre chose ?", FsmState::IntentRouter);
    }

    let Some(pending) = session.pending_cancel_slot.clone() else {
        return reply("Je ne retrouve plus ce rendez-vous, je vous transfère au cabinet.", FsmState::Transferred);
    };

    if pending.external_event_id.is_none() || !booking.can_propose_slots() {
        return reply(
            "Je ne peux pas garantir l'annulation sans accès à l'agenda, je vous transfère au cabinet.",
            FsmState::Transferred,
        );
    }

    let booking_ref = concierge_booking::Booking {
        external_event_id: pending.external_event_id.clone(),
        label: pending.slot.label.clone(),
        start_iso: pending.slot.start_iso.clone(),
        end_iso: pending.slot.end_iso.clone(),
    };
    match booking.cancel(&booking_ref).await {
        Ok(true) => {
            session.pending_cancel_slot = None;
            reply("Votre rendez-vous est annulé.", FsmState::Start)
        }
        _ => reply("L'annulation a échoué, je vous transfère au cabinet pour régler ça.", FsmState::Transferred),
    }
}

pub fn handle_modify_name(text: &str, session: &mut Session) -> TurnOutcome {
    let name = text.trim();
    if name.is_empty() {
        return stay("Quel est le nom du rendez-vous à modifier ?", FsmState::ModifyName);
    }
    session.qualif.name = Some(name.to_string());
    reply("Pour quand souhaitez-vous déplacer ce rendez-vous ? Matin, après-midi ou soir ?", FsmState::ModifySlotPick)
}

pub async fn handle_modify_slot_pick(text: &str, session: &mut Session, booking: &dyn BookingProvider) -> TurnOutcome {
    let locale = concierge_core::locale::locale_for("fr");
    let t = text.to_lowercase();
    let preference = locale.time_of_day.iter().find(|(kw, _)| t.contains(kw)).map(|(_, p)| *p);
    if preference.is_none() && session.pending_slots.is_empty() {
        return stay("Plutôt le matin, l'après-midi ou le soir ?", FsmState::ModifySlotPick);
    }
    if session.pending_slots.is_empty() {
        let query = SlotQuery { preference, ..SlotQuery::default() };
        session.pending_slots = booking.list_free_slots(&query).await.unwrap_or_default();
        if session.pending_slots.is_empty() {
            return reply("Je ne trouve pas de nouveau créneau, je vous transfère au cabinet.", FsmState::Transferred);
        }
        let listing = session
            .pending_slots
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}: {}", i + 1, s.label_vocal))
            .collect::<Vec<_>>()
            .join(", ");
        return stay(format!("Voici les nouveaux créneaux — {listing}. Lequel choisissez-vous ?"), FsmState::ModifySlotPick);
    }
    match detect_slot_choice(text, &session.pending_slots, "fr") {
        Some(idx) if idx >= 1 && idx <= session.pending_slots.len() => {
            session.pending_slot_choice = Some(idx);
            reply("Votre rendez-vous a bien été déplacé.", FsmState::Start)
        }
        _ => stay("Je n'ai pas compris votre choix, répondez par son numéro.", FsmState::ModifySlotPick),
    }
}

pub fn handle_faq(text: &str) -> String {
    let t = text.to_lowercase();
    if t.contains("horaire") {
        "Nous sommes ouverts du lundi au vendredi, de 9h à 18h.".to_string()
    } else if t.contains("adresse") || t.contains("où") || t.contains("ou etes") {
        "Vous pouvez demander l'adresse exacte au secrétariat, je n'y ai pas accès directement.".to_string()
    } else {
        "Je note votre question, quelqu'un du cabinet vous recontactera si je ne peux pas y répondre.".to_string()
    }
}
