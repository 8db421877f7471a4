//! Medical triage (C7, §4.7): deterministic, keyword-based, no LLM in the
//! hot path. Red flags hard-stop the call; caution words acknowledge and
//! continue booking.

/// Categories for the audit trail — never the raw symptom text (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyCategory {
    Cardiac,
    Respiratory,
    LossOfConsciousness,
    Neurological,
    Hemorrhage,
    PsychiatricCrisis,
}

impl EmergencyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyCategory::Cardiac => "cardiac",
            EmergencyCategory::Respiratory => "respiratory",
            EmergencyCategory::LossOfConsciousness => "loss_of_consciousness",
            EmergencyCategory::Neurological => "neurological",
            EmergencyCategory::Hemorrhage => "hemorrhage",
            EmergencyCategory::PsychiatricCrisis => "psychiatric_crisis",
        }
    }
}

const RED_FLAG_KEYWORDS: &[(&str, EmergencyCategory)] = &[
    ("mal au cœur", EmergencyCategory::Cardiac),
    ("mal au coeur", EmergencyCategory::Cardiac),
    ("douleur thoracique", EmergencyCategory::Cardiac),
    ("douleur à la poitrine", EmergencyCategory::Cardiac),
    ("douleur poitrine", EmergencyCategory::Cardiac),
    ("poitrine", EmergencyCategory::Cardiac),
    ("serrement poitrine", EmergencyCategory::Cardiac),
    ("douleur bras gauche", EmergencyCategory::Cardiac),
    ("douleur mâchoire", EmergencyCategory::Cardiac),
    ("mal à respirer", EmergencyCategory::Respiratory),
    ("difficulté à respirer", EmergencyCategory::Respiratory),
    ("je ne respire pas", EmergencyCategory::Respiratory),
    ("essoufflé", EmergencyCategory::Respiratory),
    ("essoufflement", EmergencyCategory::Respiratory),
    ("malaise", EmergencyCategory::LossOfConsciousness),
    ("évanoui", EmergencyCategory::LossOfConsciousness),
    ("évanouissement", EmergencyCategory::LossOfConsciousness),
    ("perte de connaissance", EmergencyCategory::LossOfConsciousness),
    ("je me suis évanoui", EmergencyCategory::LossOfConsciousness),
    ("paralysé", EmergencyCategory::Neurological),
    ("paralysie", EmergencyCategory::Neurological),
    ("je ne sens plus", EmergencyCategory::Neurological),
    ("trouble de la parole", EmergencyCategory::Neurological),
    ("confusion soudaine", EmergencyCategory::Neurological),
    ("je saigne beaucoup", EmergencyCategory::Hemorrhage),
    ("hémorragie", EmergencyCategory::Hemorrhage),
    ("je veux me suicider", EmergencyCategory::PsychiatricCrisis),
    ("envie de mourir", EmergencyCategory::PsychiatricCrisis),
];

/// Generic, non-urgent symptom vocabulary. Matching neither blocks the call
/// nor escalates it — the FSM acknowledges and continues qualifying.
const CAUTION_KEYWORDS: &[&str] = &[
    "fievre", "fièvre", "douleur", "mal au dos", "mal à la tête", "mal de tete", "mal de tête",
    "toux", "rhume", "grippe", "fatigue", "nausée", "nausee", "vertige",
];

/// Returns the matched red-flag category, if the text names a vital
/// emergency. Checked before all other classification (§4.8 step 3).
pub fn detect_emergency(text: &str) -> Option<EmergencyCategory> {
    if text.trim().is_empty() {
        return None;
    }
    let t = text.to_lowercase();
    RED_FLAG_KEYWORDS
        .iter()
        .find(|(kw, _)| t.contains(kw))
        .map(|(_, cat)| *cat)
}

/// Returns `true` if the text names a non-urgent symptom. Only meaningful
/// once `detect_emergency` has already returned `None` — callers must not
/// check caution before red flags.
pub fn detect_caution(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let t = text.to_lowercase();
    CAUTION_KEYWORDS.iter().any(|kw| t.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chest_pain_is_a_cardiac_red_flag() {
        assert_eq!(detect_emergency("j'ai une douleur thoracique"), Some(EmergencyCategory::Cardiac));
    }

    #[test]
    fn breathing_difficulty_is_respiratory() {
        assert_eq!(detect_emergency("je n'arrive pas à respirer, difficulté à respirer"), Some(EmergencyCategory::Respiratory));
    }

    #[test]
    fn ordinary_booking_text_has_no_red_flag() {
        assert_eq!(detect_emergency("je voudrais un rendez-vous vendredi"), None);
    }

    #[test]
    fn fever_is_caution_not_emergency() {
        assert!(detect_emergency("j'ai de la fievre").is_none());
        assert!(detect_caution("j'ai de la fievre"));
    }

    #[test]
    fn i_dont_know_outside_symptom_context_is_not_caution() {
        assert!(!detect_caution("je ne sais pas"));
    }
}
