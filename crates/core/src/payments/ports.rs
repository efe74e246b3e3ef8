//! Ports for the payment gateway and the webhook audit ledger.

use async_trait::async_trait;
use orderbridge_domain::{PaymentRequest, PaymentSession, Result, WebhookEvent};
use uuid::Uuid;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted payment session. Non-success replies are `Gateway`.
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentSession>;
}

/// Append-only store of inbound callbacks.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn append(&self, event: &WebhookEvent) -> Result<()>;

    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<WebhookEvent>>;

    /// Most recent failed events first.
    async fn list_failed(&self, limit: usize) -> Result<Vec<WebhookEvent>>;
}
