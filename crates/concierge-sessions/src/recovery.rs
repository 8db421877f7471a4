use serde_json::{Map, Value};

/// Namespaced failure counters driving per-context escalation (C5, §4.5).
///
/// Backed by a JSON object so dotted-path access (`"phone.partial"`) works
/// generically, the way the original implementation's `rec_get`/`rec_set`
/// operate on a nested dict — but the set of top-level keys is fixed by
/// `default()`, so this stays a concrete record rather than open reflection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Recovery(Map<String, Value>);

fn default_tree() -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(
        "contact".to_string(),
        serde_json::json!({"fails": 0, "retry": 0, "mode": null}),
    );
    m.insert("phone".to_string(), serde_json::json!({"partial": "", "turns": 0}));
    m.insert(
        "confirm_contact".to_string(),
        serde_json::json!({"fails": 0, "intent_repeat": 0}),
    );
    m.insert("slot_choice".to_string(), serde_json::json!({"fails": 0}));
    m.insert("name".to_string(), serde_json::json!({"fails": 0}));
    m.insert("preference".to_string(), serde_json::json!({"fails": 0}));
    m.insert("confirm_slot".to_string(), serde_json::json!({"retry": 0}));
    m
}

impl Default for Recovery {
    fn default() -> Self {
        Self(default_tree())
    }
}

impl Recovery {
    /// True when the recovery tree has never been populated (fresh session).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ex: `get("phone.partial")`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.get_ref(path)
    }

    fn get_ref(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let (last, init) = parts.split_last()?;
        let mut cur = &self.0;
        for part in init {
            cur = cur.get(*part)?.as_object()?;
        }
        cur.get(*last)
    }

    pub fn get_i64(&self, path: &str) -> i64 {
        self.get_ref(path).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn get_str(&self, path: &str) -> String {
        self.get_ref(path)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    }

    /// Ex: `set("phone.partial", json!("0612"))`.
    pub fn set(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = path.split('.').collect();
        let (last, init) = match parts.split_last() {
            Some(v) => v,
            None => return,
        };
        let mut cur = &mut self.0;
        for part in init {
            let entry = cur
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            cur = entry.as_object_mut().unwrap();
        }
        cur.insert(last.to_string(), value);
    }

    /// Increments the integer at `path` by `delta`, returns the new value.
    pub fn inc(&mut self, path: &str, delta: i64) -> i64 {
        let new_val = self.get_i64(path) + delta;
        self.set(path, Value::from(new_val));
        new_val
    }

    /// Resets a whole top-level sub-object back to its default shape.
    pub fn reset(&mut self, top_key: &str) {
        let default = default_tree();
        let value = default
            .get(top_key)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        self.0.insert(top_key.to_string(), value);
    }
}

/// Flat legacy counters that predate the dotted-path `recovery` namespace.
/// Carried only so `migrate_from_legacy` has something concrete to migrate
/// from on session load.
#[derive(Debug, Clone, Default)]
pub struct LegacyCounters {
    pub contact_fails: i64,
    pub contact_retry_count: i64,
    pub contact_mode: Option<String>,
    pub partial_phone_digits: String,
    pub contact_confirm_fails: i64,
    pub contact_confirm_intent_repeat_count: i64,
    pub slot_choice_fails: i64,
    pub name_fails: i64,
    pub preference_fails: i64,
    pub confirm_retry_count: i64,
    pub phone_fails: i64,
}

/// Must run once on every session load (§4.5): if `recovery` is empty but
/// flat legacy counters exist, copy them into the dotted paths before any
/// handler runs.
pub fn migrate_recovery_from_legacy(recovery: &mut Recovery, legacy: &LegacyCounters) {
    set_if_empty(recovery, "contact.fails", Value::from(legacy.contact_fails));
    set_if_empty(recovery, "contact.retry", Value::from(legacy.contact_retry_count));
    if let Some(mode) = &legacy.contact_mode {
        set_if_empty(recovery, "contact.mode", Value::from(mode.clone()));
    }
    set_if_empty(
        recovery,
        "phone.partial",
        Value::from(legacy.partial_phone_digits.clone()),
    );
    set_if_empty(
        recovery,
        "confirm_contact.fails",
        Value::from(legacy.contact_confirm_fails),
    );
    set_if_empty(
        recovery,
        "confirm_contact.intent_repeat",
        Value::from(legacy.contact_confirm_intent_repeat_count),
    );
    set_if_empty(recovery, "slot_choice.fails", Value::from(legacy.slot_choice_fails));
    set_if_empty(recovery, "name.fails", Value::from(legacy.name_fails));
    set_if_empty(recovery, "preference.fails", Value::from(legacy.preference_fails));
    set_if_empty(recovery, "confirm_slot.retry", Value::from(legacy.confirm_retry_count));
    if recovery.get_i64("phone.turns") == 0 && legacy.phone_fails != 0 {
        recovery.set("phone.turns", Value::from(legacy.phone_fails));
    }
}

fn set_if_empty(recovery: &mut Recovery, path: &str, legacy_val: Value) {
    let is_empty_legacy = match &legacy_val {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_i64() == Some(0),
        _ => false,
    };
    if is_empty_legacy {
        return;
    }
    let cur = recovery.get_ref(path).cloned().unwrap_or(Value::Null);
    let is_empty_cur = match &cur {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_i64() == Some(0),
        _ => false,
    };
    if is_empty_cur {
        recovery.set(path, legacy_val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tree_has_known_keys() {
        let r = Recovery::default();
        assert_eq!(r.get_i64("contact.fails"), 0);
        assert_eq!(r.get_str("phone.partial"), "");
    }

    #[test]
    fn inc_and_get_roundtrip() {
        let mut r = Recovery::default();
        assert_eq!(r.inc("contact.fails", 1), 1);
        assert_eq!(r.inc("contact.fails", 1), 2);
        assert_eq!(r.get_i64("contact.fails"), 2);
    }

    #[test]
    fn reset_restores_default_shape() {
        let mut r = Recovery::default();
        r.inc("slot_choice.fails", 3);
        r.reset("slot_choice");
        assert_eq!(r.get_i64("slot_choice.fails"), 0);
    }

    #[test]
    fn migration_only_fills_empty_paths() {
        let mut r = Recovery::default();
        r.set("name.fails", Value::from(2));
        let legacy = LegacyCounters {
            name_fails: 9,
            slot_choice_fails: 4,
            ..Default::default()
        };
        migrate_recovery_from_legacy(&mut r, &legacy);
        assert_eq!(r.get_i64("name.fails"), 2, "must not overwrite an already-set path");
        assert_eq!(r.get_i64("slot_choice.fails"), 4);
    }
}
