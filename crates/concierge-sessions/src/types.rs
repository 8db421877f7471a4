use serde::{Deserialize, Serialize};

use concierge_core::types::{CanonicalSlot, Channel, ContactKind, TenantId, TimeOfDay};

use crate::recovery::Recovery;

pub const SESSION_TTL_SECS: i64 = 15 * 60;
pub const MAX_TURNS_ANTI_LOOP: u32 = 25;
pub const MAX_CONSECUTIVE_QUESTIONS: u32 = 3;
pub const MAX_CONTEXT_FAILS: i64 = 3;
pub const MAX_EMPTY_MESSAGES: u32 = 2;

/// Partial booking data gathered across turns (§3 DATA MODEL — Session.qualif).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualifData {
    pub name: Option<String>,
    pub motif: Option<String>,
    pub preference: Option<TimeOfDay>,
    pub contact: Option<String>,
    pub contact_kind: Option<ContactKind>,
}

impl QualifData {
    /// `state = CONFIRMED ⇒ qualif.{name,motif,contact} all present` (§3 invariant).
    pub fn is_complete(&self) -> bool {
        self.name.as_deref().is_some_and(|s| !s.is_empty())
            && self.motif.as_deref().is_some_and(|s| !s.is_empty())
            && self.contact.as_deref().is_some_and(|s| !s.is_empty())
            && self.contact_kind.is_some()
    }
}

/// A booking surfaced to the caller during CANCEL/MODIFY flows, in the
/// canonical slot shape plus the external handle needed to act on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCancelSlot {
    pub slot: CanonicalSlot,
    pub external_event_id: Option<String>,
}

/// Per-conversation state (§3 DATA MODEL — Session).
///
/// Carries no business logic: the FSM engine (`concierge-fsm`) is the only
/// mutator of `state`/`qualif`/`pending_slots`; this crate only knows how to
/// store, serialize, and migrate this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub conv_id: String,
    pub tenant_id: TenantId,
    pub channel: Channel,

    /// FSM state name (owned by `concierge-fsm`'s `FsmState` enum; stored
    /// here as a string so this crate has no dependency on the FSM crate).
    pub state: String,

    pub qualif: QualifData,

    pub pending_slots: Vec<CanonicalSlot>,
    /// 1-based index into `pending_slots`, or `None` (§3 invariant).
    pub pending_slot_choice: Option<usize>,
    pub pending_cancel_slot: Option<PendingCancelSlot>,
    pub pending_preference: Option<TimeOfDay>,

    pub recovery: Recovery,

    pub turn_count: u32,
    pub consecutive_questions: u32,
    pub no_match_turns: u32,
    pub global_recovery_fails: u32,
    pub empty_message_count: u32,
    /// Counts entries into `INTENT_ROUTER` within the call; a second entry
    /// ends the call to human transfer (§4.8).
    #[serde(default)]
    pub intent_router_visits: u32,

    pub transfer_logged: bool,
    pub motif_help_used: bool,
    /// Set for exactly the turn in which the agent just read the slots
    /// aloud — licenses the barge-in fast path (§4.8 step 5).
    pub is_reading_slots: bool,

    pub last_intent: Option<String>,
    pub last_question_asked: Option<String>,

    pub last_seen_at: String,
    pub created_at: String,
}

impl Session {
    pub fn new(conv_id: impl Into<String>, tenant_id: TenantId, channel: Channel, now: String) -> Self {
        Self {
            conv_id: conv_id.into(),
            tenant_id,
            channel,
            state: "START".to_string(),
            qualif: QualifData::default(),
            pending_slots: Vec::new(),
            pending_slot_choice: None,
            pending_cancel_slot: None,
            pending_preference: None,
            recovery: Recovery::default(),
            turn_count: 0,
            consecutive_questions: 0,
            no_match_turns: 0,
            global_recovery_fails: 0,
            empty_message_count: 0,
            intent_router_visits: 0,
            transfer_logged: false,
            motif_help_used: false,
            is_reading_slots: false,
            last_intent: None,
            last_question_asked: None,
            last_seen_at: now.clone(),
            created_at: now,
        }
    }

    /// `pending_slot_choice ∈ [1, len(pending_slots)]` or null (§3 invariant).
    pub fn is_pending_choice_valid(&self) -> bool {
        match self.pending_slot_choice {
            None => true,
            Some(k) => k >= 1 && k <= self.pending_slots.len(),
        }
    }

    pub fn touch(&mut self, now: String) {
        self.last_seen_at = now;
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match chrono::DateTime::parse_from_rfc3339(&self.last_seen_at) {
            Ok(last) => (now - last.with_timezone(&chrono::Utc)).num_seconds() > SESSION_TTL_SECS,
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_has_no_pending_choice() {
        let s = Session::new("c1", TenantId::from(1), Channel::Web, "2026-01-01T00:00:00Z".to_string());
        assert!(s.is_pending_choice_valid());
        assert!(!s.qualif.is_complete());
    }

    #[test]
    fn pending_choice_out_of_range_is_invalid() {
        let mut s = Session::new("c1", TenantId::from(1), Channel::Web, "2026-01-01T00:00:00Z".to_string());
        s.pending_slot_choice = Some(2);
        assert!(!s.is_pending_choice_valid());
    }
}
