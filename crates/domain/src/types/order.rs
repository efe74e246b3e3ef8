//! Orders and their payment-driven lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;
use crate::types::quotation::Quotation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    AwaitingPayment,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

impl_domain_status_conversions!(OrderStatus {
    Pending => "pending",
    AwaitingPayment => "awaiting_payment",
    Paid => "paid",
    Failed => "failed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl OrderStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::AwaitingPayment,
        Self::Paid,
        Self::Failed,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Statuses from which a user may start a (new) payment attempt.
    pub const PAYABLE: [Self; 4] =
        [Self::Pending, Self::AwaitingPayment, Self::Failed, Self::Cancelled];

    /// Outcome statuses of a single transaction reference.
    #[must_use]
    pub const fn is_payment_outcome(self) -> bool {
        matches!(self, Self::Paid | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub org_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    /// Quotation this order was created from, carried through payment.
    pub quotation_id: Option<Uuid>,
    pub number: String,
    pub total_cents: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub gateway_tran_ref: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub external_sales_order_id: Option<String>,
    pub external_invoice_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshot a quotation into a new order.
    #[must_use]
    pub fn from_quotation(
        quotation: &Quotation,
        id: Uuid,
        number: String,
        status: OrderStatus,
        gateway_tran_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let items = quotation
            .items
            .iter()
            .map(|item| OrderItem {
                order_id: id,
                product_id: item.product_id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents,
            })
            .collect();

        Self {
            id,
            org_id: quotation.org_id,
            branch_id: quotation.branch_id,
            customer_id: quotation.customer_id,
            quotation_id: Some(quotation.id),
            number,
            total_cents: quotation.total_cents,
            currency: quotation.currency.clone(),
            status,
            gateway_tran_ref,
            gateway_payment_id: None,
            external_sales_order_id: None,
            external_invoice_id: None,
            items,
            created_at: now,
            updated_at: now,
        }
    }
}
