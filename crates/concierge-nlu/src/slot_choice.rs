//! Slot-choice parser (C6, §4.6): classifies a user utterance against up to
//! three proposed slots, in a fixed rule order designed to reject bare
//! digits and phone-number lookalikes rather than guess.

use chrono::DateTime;
use concierge_core::locale::{locale_for, Locale};
use concierge_core::types::CanonicalSlot;
use regex::Regex;
use std::sync::OnceLock;

fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let collapsed_quotes = whitespace_and_quote_re().replace_all(&lowered, " ");
    let stripped_punct = punctuation_re().replace_all(&collapsed_quotes, " ");
    whitespace_re()
        .replace_all(&stripped_punct, " ")
        .trim()
        .to_string()
}

fn whitespace_and_quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s']+").unwrap())
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.,;!?°]+").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn day_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})\s*[h:]\s*(\d{0,2})\b").unwrap())
}

fn bare_hour_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})\s*h\b").unwrap())
}

/// `(weekday Monday=0, hour, minute)` extracted from free text.
fn parse_day_time(text: &str, locale: &Locale) -> Option<(u8, u32, u32)> {
    let t = normalize(text);
    let weekday = locale
        .weekdays
        .iter()
        .find(|(name, _)| contains_word(&t, name))
        .map(|(_, wd)| *wd)?;

    if let Some(caps) = day_time_re().captures(&t) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = if caps[2].is_empty() { 0 } else { caps[2].parse().ok()? };
        if hour <= 23 && minute <= 59 {
            return Some((weekday, hour, minute));
        }
        return None;
    }
    if let Some(caps) = bare_hour_re().captures(&t) {
        let hour: u32 = caps[1].parse().ok()?;
        if hour <= 23 {
            return Some((weekday, hour, 0));
        }
    }
    None
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split_whitespace().any(|w| w == word)
}

fn slot_day_hour_min(slot: &CanonicalSlot) -> Option<(u8, u32, u32)> {
    let dt = DateTime::parse_from_rfc3339(&slot.start_iso).ok()?;
    let weekday = dt.weekday().num_days_from_monday() as u8;
    Some((weekday, dt.hour(), dt.minute()))
}

use chrono::{Datelike, Timelike};

/// Matches day+time mentioned in `text` against `slots`. Returns the 1-based
/// index iff exactly one slot matches; 0 or 2+ matches both return `None`.
pub fn detect_slot_choice_by_datetime(text: &str, slots: &[CanonicalSlot], locale: &Locale) -> Option<usize> {
    if text.trim().is_empty() || slots.is_empty() {
        return None;
    }
    let target = parse_day_time(text, locale)?;
    let mut matches = slots.iter().enumerate().filter_map(|(i, slot)| {
        let key = slot_day_hour_min(slot)?;
        (key == target).then_some(i + 1)
    });
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Rule-ordered classification of a user utterance into a 1-based slot
/// index, or `None` if ambiguous. Rules run in the exact order of §4.6;
/// earlier rules win.
pub fn detect_slot_choice(text: &str, pending_slots: &[CanonicalSlot], language_tag: &str) -> Option<usize> {
    if text.trim().is_empty() {
        return None;
    }
    let locale = locale_for(language_tag);
    let t = normalize(text);

    // 1. Bare digit, exact message only.
    if let Ok(n @ 1..=3) = t.parse::<usize>() {
        return Some(n);
    }

    // 2. Bare affirmation alone is ambiguous, not a choice.
    if locale.bare_affirmations.contains(&t.as_str()) {
        return None;
    }

    // 3. Ordinal with optional leading article.
    if let Some(idx) = match_ordinal(&t, locale) {
        return Some(idx);
    }

    // 4. Marker + digit/ordinal.
    if let Some(idx) = match_marker_and_choice(&t, locale) {
        return Some(idx);
    }

    // 5. Day+time extraction matched against the proposed slots.
    let by_datetime = detect_slot_choice_by_datetime(text, pending_slots, locale);
    if by_datetime.is_some() {
        return by_datetime;
    }

    // 6. Anything else (bare digits in a longer sentence, phone-number
    // lookalikes) is explicitly rejected, not guessed.
    None
}

fn match_ordinal(t: &str, locale: &Locale) -> Option<usize> {
    let body = t.strip_prefix("le ").unwrap_or(t);
    locale
        .ordinals
        .iter()
        .find(|(word, _)| *word == body)
        .map(|(_, idx)| *idx)
        .or_else(|| match body {
            "un" => Some(1),
            "deux" | "second" => Some(2),
            "trois" => Some(3),
            _ => None,
        })
}

fn match_marker_and_choice(t: &str, locale: &Locale) -> Option<usize> {
    let mut parts = t.splitn(2, ' ');
    let marker = parts.next()?;
    let rest = parts.next()?.trim();
    if rest.is_empty() || !locale.choice_markers.contains(&marker) {
        return None;
    }
    match rest {
        "1" | "un" | "premier" => Some(1),
        "2" | "deux" | "deuxieme" | "deuxième" | "second" => Some(2),
        "3" | "trois" | "troisieme" | "troisième" => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::types::SlotSource;

    fn slot(start_iso: &str, idx: usize) -> CanonicalSlot {
        CanonicalSlot {
            id: format!("slot-{idx}"),
            start_iso: start_iso.to_string(),
            end_iso: start_iso.to_string(),
            label: format!("slot {idx}"),
            label_vocal: format!("slot {idx}"),
            day: String::new(),
            source: SlotSource::Calendar,
        }
    }

    #[test]
    fn bare_digit_exact_message_is_accepted() {
        assert_eq!(detect_slot_choice("2", &[], "fr"), Some(2));
    }

    #[test]
    fn bare_digit_in_sentence_is_rejected() {
        assert_eq!(detect_slot_choice("j'ai 2 questions", &[], "fr"), None);
        assert_eq!(detect_slot_choice("je veux 3 rendez-vous", &[], "fr"), None);
    }

    #[test]
    fn bare_affirmation_is_ambiguous() {
        assert_eq!(detect_slot_choice("oui", &[], "fr"), None);
        assert_eq!(detect_slot_choice("d'accord", &[], "fr"), None);
    }

    #[test]
    fn ordinal_with_or_without_article() {
        assert_eq!(detect_slot_choice("le premier", &[], "fr"), Some(1));
        assert_eq!(detect_slot_choice("deuxième", &[], "fr"), Some(2));
        assert_eq!(detect_slot_choice("troisieme", &[], "fr"), Some(3));
    }

    #[test]
    fn marker_plus_digit_is_accepted() {
        assert_eq!(detect_slot_choice("oui 1", &[], "fr"), Some(1));
        assert_eq!(detect_slot_choice("choix 2", &[], "fr"), Some(2));
        assert_eq!(detect_slot_choice("créneau 3", &[], "fr"), Some(3));
        assert_eq!(detect_slot_choice("numero 2", &[], "fr"), Some(2));
    }

    #[test]
    fn phone_number_lookalike_with_numero_marker_word_alone_is_rejected() {
        assert_eq!(detect_slot_choice("mon numero c'est 06 12 34 56 78", &[], "fr"), None);
    }

    #[test]
    fn day_alone_or_time_alone_is_rejected() {
        assert_eq!(detect_slot_choice("vendredi", &[], "fr"), None);
        assert_eq!(detect_slot_choice("14h", &[], "fr"), None);
    }

    #[test]
    fn day_and_time_matching_exactly_one_slot_is_accepted() {
        let slots = vec![slot("2024-01-05T14:00:00+00:00", 1), slot("2024-01-06T09:00:00+00:00", 2)];
        // 2024-01-05 is a Friday.
        assert_eq!(detect_slot_choice("vendredi 14h", &slots, "fr"), Some(1));
    }

    #[test]
    fn day_and_time_matching_multiple_slots_is_ambiguous() {
        let slots = vec![slot("2024-01-05T14:00:00+00:00", 1), slot("2024-01-12T14:00:00+00:00", 2)];
        assert_eq!(detect_slot_choice("vendredi 14h", &slots, "fr"), None);
    }
}
