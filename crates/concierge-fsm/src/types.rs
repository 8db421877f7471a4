use std::fmt;
use std::str::FromStr;

/// States of the conversation engine (§4.8). Main line:
/// `START → EXTRACT → QUALIF_NAME → QUALIF_MOTIF → QUALIF_PREF →
/// PROPOSE_SLOTS → WAIT_CONFIRM → QUALIF_CONTACT → CONTACT_CONFIRM →
/// CONFIRMED`. Side states handle emergencies, transfer, intent routing,
/// cancel, modify, and FAQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsmState {
    Start,
    Extract,
    QualifName,
    QualifMotif,
    QualifPref,
    ProposeSlots,
    WaitConfirm,
    QualifContact,
    ContactConfirm,
    Confirmed,
    Emergency,
    Transferred,
    IntentRouter,
    CancelName,
    CancelConfirm,
    ModifyName,
    ModifySlotPick,
    FaqAnswer,
}

impl FsmState {
    /// Terminal states never progress further: any further message re-emits
    /// the terminal-state utterance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FsmState::Confirmed | FsmState::Emergency | FsmState::Transferred)
    }
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsmState::Start => "START",
            FsmState::Extract => "EXTRACT",
            FsmState::QualifName => "QUALIF_NAME",
            FsmState::QualifMotif => "QUALIF_MOTIF",
            FsmState::QualifPref => "QUALIF_PREF",
            FsmState::ProposeSlots => "PROPOSE_SLOTS",
            FsmState::WaitConfirm => "WAIT_CONFIRM",
            FsmState::QualifContact => "QUALIF_CONTACT",
            FsmState::ContactConfirm => "CONTACT_CONFIRM",
            FsmState::Confirmed => "CONFIRMED",
            FsmState::Emergency => "EMERGENCY",
            FsmState::Transferred => "TRANSFERRED",
            FsmState::IntentRouter => "INTENT_ROUTER",
            FsmState::CancelName => "CANCEL_NAME",
            FsmState::CancelConfirm => "CANCEL_CONFIRM",
            FsmState::ModifyName => "MODIFY_NAME",
            FsmState::ModifySlotPick => "MODIFY_SLOT_PICK",
            FsmState::FaqAnswer => "FAQ_ANSWER",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FsmState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "START" => FsmState::Start,
            "EXTRACT" => FsmState::Extract,
            "QUALIF_NAME" => FsmState::QualifName,
            "QUALIF_MOTIF" => FsmState::QualifMotif,
            "QUALIF_PREF" => FsmState::QualifPref,
            "PROPOSE_SLOTS" => FsmState::ProposeSlots,
            "WAIT_CONFIRM" => FsmState::WaitConfirm,
            "QUALIF_CONTACT" => FsmState::QualifContact,
            "CONTACT_CONFIRM" => FsmState::ContactConfirm,
            "CONFIRMED" => FsmState::Confirmed,
            "EMERGENCY" => FsmState::Emergency,
            "TRANSFERRED" => FsmState::Transferred,
            "INTENT_ROUTER" => FsmState::IntentRouter,
            "CANCEL_NAME" => FsmState::CancelName,
            "CANCEL_CONFIRM" => FsmState::CancelConfirm,
            "MODIFY_NAME" => FsmState::ModifyName,
            "MODIFY_SLOT_PICK" => FsmState::ModifySlotPick,
            "FAQ_ANSWER" => FsmState::FaqAnswer,
            other => return Err(format!("unknown FSM state: {other}")),
        })
    }
}

/// Top-level intents that preempt the current state (§4.8 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Cancel,
    Modify,
    HumanTransfer,
    FaqQuestion,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Cancel => "CANCEL",
            Intent::Modify => "MODIFY",
            Intent::HumanTransfer => "HUMAN_TRANSFER",
            Intent::FaqQuestion => "FAQ_QUESTION",
        }
    }
}

/// Result of handling one user turn: the reply to speak/send back, the
/// resulting state, and whether this turn's state handler actually changed
/// state (gates the checkpoint write per §4.3/§4.8 step 7).
pub struct TurnOutcome {
    pub reply: String,
    pub state: FsmState,
    pub state_changed: bool,
}
