use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{BillingError, Result};
use crate::signature::{verify_webhook_signature, DEFAULT_TOLERANCE_SECS};
use crate::store;
use crate::types::BillingStatus;

/// Verifies, deduplicates and dispatches one payment-provider webhook
/// delivery. Returns `Ok(())` for both a freshly-handled event and a replay
/// of an already-processed one — the caller always answers the webhook 200.
pub fn handle_webhook(
    conn: &Connection,
    raw_body: &[u8],
    signature_header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    if !verify_webhook_signature(raw_body, signature_header, secret, now, DEFAULT_TOLERANCE_SECS) {
        return Err(BillingError::InvalidSignature);
    }

    let event: Value = serde_json::from_slice(raw_body)
        .map_err(|e| BillingError::Malformed(e.to_string()))?;
    let event_id = event
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| BillingError::Malformed("missing event id".to_string()))?;
    let kind = event
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| BillingError::Malformed("missing event type".to_string()))?;

    if !store::try_acquire_webhook_event(conn, event_id, kind, now)? {
        info!(event_id, kind, "duplicate webhook delivery, skipping");
        return Ok(());
    }

    let data = event.pointer("/data/object").unwrap_or(&Value::Null);

    match kind {
        "customer.subscription.created" | "customer.subscription.updated" => {
            apply_subscription_update(conn, data, now)?;
        }
        "customer.subscription.deleted" => {
            if let Some(tenant_id) = resolve_tenant_id(conn, data)? {
                store::clear_subscription(conn, &tenant_id, now)?;
                info!(tenant_id, "subscription cancelled");
            }
        }
        "invoice.payment_failed" => {
            if let Some(tenant_id) = resolve_tenant_id(conn, data)? {
                store::update_billing_status(conn, &tenant_id, BillingStatus::PastDue, now)?;
                warn!(tenant_id, "invoice payment failed, marked past_due");
            }
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            if let Some(tenant_id) = resolve_tenant_id(conn, data)? {
                reactivate_if_suspended(conn, &tenant_id, now)?;
            }
        }
        other => {
            info!(event_id, kind = other, "unhandled webhook event type, ignored");
        }
    }

    Ok(())
}

fn apply_subscription_update(conn: &Connection, data: &Value, now: DateTime<Utc>) -> Result<()> {
    let customer_id = data
        .get("customer")
        .and_then(Value::as_str)
        .ok_or_else(|| BillingError::Malformed("missing customer id".to_string()))?;
    let subscription_id = data
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let status: BillingStatus = data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("incomplete")
        .parse()
        .unwrap_or(BillingStatus::Incomplete);
    let tenant_id = data
        .pointer("/metadata/tenant_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(store::tenant_id_by_customer_id(conn, customer_id)?)
        .ok_or_else(|| BillingError::UnknownTenant(customer_id.to_string()))?;

    let plan_key = data
        .pointer("/items/data/0/price/lookup_key")
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_string();
    let metered_item_id = data
        .pointer("/items/data/0/id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let period_start = unix_ts(data.get("current_period_start"));
    let period_end = unix_ts(data.get("current_period_end"));

    store::upsert_billing_from_subscription(
        conn,
        &tenant_id,
        customer_id,
        subscription_id,
        status,
        &plan_key,
        metered_item_id.as_deref(),
        period_start,
        period_end,
        now,
    )?;

    if let Some(email) = data.get("customer_email").and_then(Value::as_str) {
        let name = data.pointer("/metadata/tenant_name").and_then(Value::as_str).unwrap_or(&tenant_id);
        store::upsert_contact(conn, &tenant_id, email, name)?;
    }

    if status.is_reactivating() {
        reactivate_if_suspended(conn, &tenant_id, now)?;
    }

    info!(tenant_id, %status, "subscription synced from webhook");
    Ok(())
}

fn reactivate_if_suspended(conn: &Connection, tenant_id: &str, now: DateTime<Utc>) -> Result<()> {
    if let Some(billing) = store::get_tenant_billing(conn, tenant_id)? {
        if billing.is_suspended && billing.status.is_reactivating() {
            store::set_tenant_unsuspended(conn, tenant_id, now)?;
            tracing::warn!(
                event = concierge_core::audit::AuditEvent::TenantUnsuspendedPayment.as_str(),
                tenant_id,
                "tenant reactivated after payment resolved"
            );
        }
    }
    Ok(())
}

fn resolve_tenant_id(conn: &Connection, data: &Value) -> Result<Option<String>> {
    if let Some(tenant_id) = data.pointer("/metadata/tenant_id").and_then(Value::as_str) {
        return Ok(Some(tenant_id.to_string()));
    }
    let customer_id = data
        .get("customer")
        .and_then(Value::as_str)
        .or_else(|| data.get("id").and_then(Value::as_str));
    match customer_id {
        Some(cid) => store::tenant_id_by_customer_id(conn, cid),
        None => Ok(None),
    }
}

fn unix_ts(v: Option<&Value>) -> DateTime<Utc> {
    v.and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::signature::verify_webhook_signature;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().unwrap();
        init_db(&c).unwrap();
        c
    }

    fn sign(body: &[u8], secret: &str, ts: i64) -> String {
        let payload = format!("{ts}.{}", String::from_utf8_lossy(body));
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn subscription_updated_upserts_billing_row() {
        let c = conn();
        let now = Utc::now();
        let body = serde_json::json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": {"object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": "active",
                "current_period_start": now.timestamp(),
                "current_period_end": now.timestamp() + 2_592_000,
                "metadata": {"tenant_id": "tenant-a"},
                "items": {"data": [{"id": "si_1", "price": {"lookup_key": "pro"}}]}
            }}
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let header = sign(&raw, "whsec", now.timestamp());
        assert!(verify_webhook_signature(&raw, &header, "whsec", now, DEFAULT_TOLERANCE_SECS));

        handle_webhook(&c, &raw, &header, "whsec", now).unwrap();
        let billing = store::get_tenant_billing(&c, "tenant-a").unwrap().unwrap();
        assert_eq!(billing.status, BillingStatus::Active);
        assert_eq!(billing.plan_key, "pro");
    }

    #[test]
    fn duplicate_event_is_not_reprocessed() {
        let c = conn();
        let now = Utc::now();
        let body = serde_json::json!({
            "id": "evt_dup",
            "type": "invoice.payment_failed",
            "data": {"object": {"customer": "cus_1", "metadata": {"tenant_id": "tenant-a"}}}
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let header = sign(&raw, "whsec", now.timestamp());

        store::upsert_billing_from_subscription(
            &c, "tenant-a", "cus_1", "sub_1", BillingStatus::Active, "pro", None, now, now, now,
        ).unwrap();

        handle_webhook(&c, &raw, &header, "whsec", now).unwrap();
        let billing = store::get_tenant_billing(&c, "tenant-a").unwrap().unwrap();
        assert_eq!(billing.status, BillingStatus::PastDue);

        store::update_billing_status(&c, "tenant-a", BillingStatus::Active, now).unwrap();
        handle_webhook(&c, &raw, &header, "whsec", now).unwrap();
        let billing = store::get_tenant_billing(&c, "tenant-a").unwrap().unwrap();
        assert_eq!(billing.status, BillingStatus::Active, "replay must not re-apply the event");
    }

    #[test]
    fn bad_signature_is_rejected() {
        let c = conn();
        let now = Utc::now();
        let raw = b"{}";
        let result = handle_webhook(&c, raw, "t=0,v1=bad", "whsec", now);
        assert!(matches!(result, Err(BillingError::InvalidSignature)));
    }
}
