use serde::Serialize;

/// Closed catalogue of audit-worthy events.
///
/// Mirrors the event-constant catalogue in the original implementation's
/// `log_events.py`: a stable event name plus categorical fields, never the
/// raw user text. Emitted via `tracing` with `event` as a structured field
/// (e.g. `tracing::warn!(event = event.as_str(), category, "...")`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// A medical red-flag keyword matched; session moved to `EMERGENCY`.
    MedicalRedFlagTriggered,
    /// Tenant suspended by an admin with immediate effect (no grace).
    TenantSuspendedManualHard,
    /// Tenant suspended by an admin but still servable until grace expires.
    TenantSuspendedManualSoft,
    /// Tenant suspended by the daily billing job for non-payment.
    TenantSuspendedPastDue,
    /// Tenant suspension lifted after a successful payment webhook.
    TenantUnsuspendedPayment,
    /// Call routed to a human (idempotent per call via `transfer_logged`).
    HumanTransferred,
}

impl AuditEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEvent::MedicalRedFlagTriggered => "medical_red_flag_triggered",
            AuditEvent::TenantSuspendedManualHard => "tenant_suspended_manual_hard",
            AuditEvent::TenantSuspendedManualSoft => "tenant_suspended_manual_soft",
            AuditEvent::TenantSuspendedPastDue => "tenant_suspended_past_due",
            AuditEvent::TenantUnsuspendedPayment => "tenant_unsuspended_stripe_payment",
            AuditEvent::HumanTransferred => "human_transferred",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_catalogue() {
        assert_eq!(
            AuditEvent::MedicalRedFlagTriggered.as_str(),
            "medical_red_flag_triggered"
        );
        assert_eq!(
            AuditEvent::TenantUnsuspendedPayment.as_str(),
            "tenant_unsuspended_stripe_payment"
        );
    }
}
