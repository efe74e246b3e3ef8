//! Persistence ports for quotations and orders.
//!
//! Status writes are conditional: they name the statuses the caller read
//! and report whether the row actually moved. Concurrent requests rely on
//! this instead of in-process locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderbridge_domain::{Order, OrderStatus, Quotation, QuotationStatus, Result};
use uuid::Uuid;

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    /// Insert a quotation with its items. Duplicate numbers are `Conflict`.
    async fn insert(&self, quotation: &Quotation) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Quotation>>;

    /// Move to `next` only while the stored status is one of `expected`,
    /// recording `note` in the status history. Returns whether it moved.
    async fn update_status_if(
        &self,
        id: Uuid,
        expected: &[QuotationStatus],
        next: QuotationStatus,
        note: Option<&str>,
    ) -> Result<bool>;

    async fn set_external_estimate_id(&self, id: Uuid, estimate_id: &str) -> Result<()>;

    /// Non-terminal quotations whose validity ended before `now`.
    async fn find_expirable(&self, now: DateTime<Utc>) -> Result<Vec<Quotation>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert an order created from its quotation in one transaction.
    ///
    /// With `convert_quotation` the quotation is moved from approved/sent to
    /// converted in the same transaction; if it is no longer convertible
    /// nothing is written and `Conflict` is returned. At most one order may
    /// exist per quotation; a second insert is `Conflict`.
    async fn insert_for_quotation(&self, order: &Order, convert_quotation: bool) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Order>>;

    async fn find_by_tran_ref(&self, tran_ref: &str) -> Result<Option<Order>>;

    async fn find_by_quotation(&self, quotation_id: Uuid) -> Result<Option<Order>>;

    /// Conditional status move; `payment_id` is stored when given.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        next: OrderStatus,
        payment_id: Option<&str>,
    ) -> Result<bool>;

    /// Attach a fresh transaction reference and move to awaiting payment,
    /// only while the stored status is one of `expected`.
    async fn assign_tran_ref(&self, id: Uuid, expected: &[OrderStatus], tran_ref: &str)
        -> Result<bool>;

    async fn set_external_sales_order_id(&self, id: Uuid, sales_order_id: &str) -> Result<()>;

    async fn set_external_invoice_id(&self, id: Uuid, invoice_id: &str) -> Result<()>;
}
