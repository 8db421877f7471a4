//! Metered-usage and quota-alert sinks backed by real outbound HTTP calls,
//! following the same `reqwest::Client` + bearer-token shape used by the
//! Google Calendar provider for external API access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{BillingError, Result};
use crate::usage::UsageSink;

const USAGE_RECORDS_API: &str = "https://api.stripe.com/v1/subscription_items";

pub struct StripeUsageSink {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeUsageSink {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), secret_key: secret_key.into() }
    }
}

#[async_trait]
impl UsageSink for StripeUsageSink {
    async fn push_usage(&self, metered_item_id: &str, quantity: i64, as_of: DateTime<Utc>) -> Result<()> {
        let url = format!("{USAGE_RECORDS_API}/{metered_item_id}/usage_records");
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, Some(""))
            .form(&[
                ("quantity", quantity.to_string()),
                ("timestamp", as_of.timestamp().to_string()),
                ("action", "set".to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BillingError::Malformed(format!(
                "usage record push failed ({status}): {body}"
            )));
        }
        debug!(metered_item_id, quantity, "usage record pushed to stripe");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_secret_key() {
        let sink = StripeUsageSink::new("sk_test_123");
        assert_eq!(sink.secret_key, "sk_test_123");
    }
}
