//! Locale vocabulary tables, keyed by IETF-ish language tag.
//!
//! §9 DESIGN NOTES isolates the time-of-day/weekday taxonomy behind a table
//! rather than hardcoding French strings into the slot-choice parser or the
//! FSM. `"fr"` is the only table shipped; the lookup itself is not
//! French-specific.

use crate::types::TimeOfDay;

/// Weekday vocabulary and affirmation/ordinal tables for one language.
pub struct Locale {
    /// Weekday name (lowercase) → ISO weekday, Monday = 0.
    pub weekdays: &'static [(&'static str, u8)],
    /// Bare affirmations that, alone, do NOT resolve a slot choice
    /// (§4.6 rule 2 — ambiguous).
    pub bare_affirmations: &'static [&'static str],
    /// Ordinal word → 1-based slot index.
    pub ordinals: &'static [(&'static str, usize)],
    /// Marker words that license a following digit/ordinal as a slot choice
    /// (§4.6 rule 4).
    pub choice_markers: &'static [&'static str],
    /// Time-of-day keyword → preference.
    pub time_of_day: &'static [(&'static str, TimeOfDay)],
}

pub const FR: Locale = Locale {
    weekdays: &[
        ("lundi", 0),
        ("mardi", 1),
        ("mercredi", 2),
        ("jeudi", 3),
        ("vendredi", 4),
        ("samedi", 5),
        ("dimanche", 6),
    ],
    bare_affirmations: &[
        "oui",
        "ouais",
        "ouaip",
        "daccord",
        "d'accord",
        "ok",
        "okay",
        "parfait",
        "c'est ça",
        "c est ça",
    ],
    ordinals: &[("premier", 1), ("deuxieme", 2), ("deuxième", 2), ("troisieme", 3), ("troisième", 3)],
    choice_markers: &["oui", "choix", "option", "creneau", "créneau", "numero", "numéro", "n", "le"],
    time_of_day: &[
        ("matin", TimeOfDay::Morning),
        ("apres-midi", TimeOfDay::Afternoon),
        ("après-midi", TimeOfDay::Afternoon),
        ("aprem", TimeOfDay::Afternoon),
        ("soir", TimeOfDay::Evening),
        ("soiree", TimeOfDay::Evening),
        ("soirée", TimeOfDay::Evening),
    ],
};

/// Resolve a locale table by language tag. Falls back to `fr` — this
/// service currently ships one locale, but the table lookup itself is not
/// hardcoded to it.
pub fn locale_for(language_tag: &str) -> &'static Locale {
    match language_tag {
        "fr" => &FR,
        _ => &FR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fr_has_seven_weekdays() {
        assert_eq!(FR.weekdays.len(), 7);
    }

    #[test]
    fn unknown_tag_falls_back_to_fr() {
        assert_eq!(locale_for("xx").weekdays.len(), FR.weekdays.len());
    }
}
