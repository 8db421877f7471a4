use concierge_sessions::Session;

pub const ESCALATION_THRESHOLD: i64 = 3;

/// §4.5 escalation rule: three failures in a single context routes to
/// `INTENT_ROUTER`. Call after incrementing the relevant counter.
pub fn should_escalate(session: &Session, context: &str) -> bool {
    session.recovery.get_i64(&format!("{context}.fails")) >= ESCALATION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::types::{Channel, TenantId};

    fn session() -> Session {
        Session::new("c1", TenantId::from(1), Channel::Voice, "2026-01-01T00:00:00Z".to_string())
    }

    #[test]
    fn escalates_at_three_fails_not_before() {
        let mut s = session();
        s.recovery.inc("name.fails", 1);
        s.recovery.inc("name.fails", 1);
        assert!(!should_escalate(&s, "name"));
        s.recovery.inc("name.fails", 1);
        assert!(should_escalate(&s, "name"));
    }
}
