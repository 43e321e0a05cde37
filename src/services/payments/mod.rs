pub mod stripe;

use async_trait::async_trait;

/// Read-only view of the external payment processor.
#[async_trait]
pub trait PaymentStatusProvider: Send + Sync {
    /// `Ok(true)` once the payment behind `reference` is fully captured.
    /// Any `Err` means the answer is unknown.
    async fn is_payment_complete(&self, reference: &str) -> anyhow::Result<bool>;
}
