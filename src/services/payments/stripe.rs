use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::PaymentStatusProvider;

/// Looks up Stripe Checkout sessions by id.
pub struct StripePaymentProvider {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CheckoutSession {
    payment_status: String,
}

impl StripePaymentProvider {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentStatusProvider for StripePaymentProvider {
    async fn is_payment_complete(&self, reference: &str) -> anyhow::Result<bool> {
        anyhow::ensure!(!self.api_key.is_empty(), "payment provider is not configured");

        let url = format!("{}/checkout/sessions/{}", self.api_url, reference);

        let session: CheckoutSession = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("failed to reach payment provider")?
            .error_for_status()
            .context("payment provider returned error")?
            .json()
            .await
            .context("failed to decode checkout session")?;

        Ok(session.payment_status == "paid")
    }
}
