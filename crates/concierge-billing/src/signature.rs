use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance for the `t=` timestamp in a provider signature header,
/// matching the payment provider's own default replay window.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verifies a `Stripe-Signature`-style header of the form
/// `t=<unix_ts>,v1=<hex_hmac>[,v1=<hex_hmac>...]` against the raw body, per
/// the provider's documented `t.payload` signing scheme.
pub fn verify_webhook_signature(
    raw_body: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut v1_sigs: Vec<&str> = Vec::new();

    for item in header.split(',') {
        let mut parts = item.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => v1_sigs.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else { return false };
    if (now.timestamp() - timestamp).abs() > tolerance_secs {
        return false;
    }
    if v1_sigs.is_empty() {
        return false;
    }

    let signed_payload = format!("{timestamp}.{}", String::from_utf8_lossy(raw_body));
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else { return false };
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    v1_sigs.iter().any(|candidate| {
        candidate.len() == expected.len()
            && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str, ts: i64) -> String {
        let payload = format!("{ts}.{}", String::from_utf8_lossy(body));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_within_tolerance_passes() {
        let now = Utc::now();
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, "whsec_test", now.timestamp());
        assert!(verify_webhook_signature(body, &header, "whsec_test", now, DEFAULT_TOLERANCE_SECS));
    }

    #[test]
    fn tampered_body_fails() {
        let now = Utc::now();
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, "whsec_test", now.timestamp());
        assert!(!verify_webhook_signature(b"{\"id\":\"evt_2\"}", &header, "whsec_test", now, DEFAULT_TOLERANCE_SECS));
    }

    #[test]
    fn expired_timestamp_fails() {
        let now = Utc::now();
        let body = br#"{"id":"evt_1"}"#;
        let old_ts = now.timestamp() - 10_000;
        let header = sign(body, "whsec_test", old_ts);
        assert!(!verify_webhook_signature(body, &header, "whsec_test", now, DEFAULT_TOLERANCE_SECS));
    }

    #[test]
    fn wrong_secret_fails() {
        let now = Utc::now();
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, "whsec_other", now.timestamp());
        assert!(!verify_webhook_signature(body, &header, "whsec_test", now, DEFAULT_TOLERANCE_SECS));
    }
}
