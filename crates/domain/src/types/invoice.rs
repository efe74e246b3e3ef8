use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
    Overdue,
}

impl_domain_status_conversions!(InvoiceStatus {
    Draft => "draft",
    Sent => "sent",
    Paid => "paid",
    Void => "void",
    Overdue => "overdue",
});

/// Local mirror of an ERP invoice. Never the source of payment state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub org_id: Uuid,
    pub order_id: Uuid,
    pub number: String,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub pdf_url: Option<String>,
    pub external_invoice_id: Option<String>,
}
