//! Documents exchanged with the ERP across the core port.
//!
//! Amounts stay in integer cents here; the ERP adapter converts to the
//! provider's decimal rates on the wire.

use serde::{Deserialize, Serialize};

/// Item as listed by the ERP catalog endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErpItem {
    pub item_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub rate_cents: i64,
    pub stock_on_hand: Option<i64>,
    pub active: bool,
}

impl ErpItem {
    /// Natural key used for local upserts.
    #[must_use]
    pub fn natural_key(&self) -> &str {
        match self.sku.as_deref() {
            Some(sku) if !sku.trim().is_empty() => sku.trim(),
            _ => &self.item_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpContactDraft {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpLineItem {
    pub item_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub rate_cents: i64,
}

/// Estimate, sales order or invoice payload sent to the ERP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpDocumentDraft {
    pub contact_id: String,
    pub reference_number: String,
    pub currency: String,
    pub line_items: Vec<ErpLineItem>,
    pub notes: Option<String>,
    /// Sales order an invoice is raised against.
    pub sales_order_id: Option<String>,
}

/// Identifiers the ERP assigns to a created document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpDocumentRef {
    pub id: String,
    pub number: Option<String>,
    pub status: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpOrganization {
    pub organization_id: String,
    pub name: String,
    pub is_default: bool,
}

/// Inbound ERP webhook, decoded from its JSON envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ErpEvent {
    ItemUpserted { tenant_id: Option<String>, item: ErpItem },
    ItemDeleted { tenant_id: Option<String>, item_id: String },
    InvoiceStatusChanged { tenant_id: Option<String>, invoice_id: String, status: String },
    /// Recognised envelope with an event type nothing handles.
    Unhandled { event_type: String },
}

impl ErpEvent {
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Self::ItemUpserted { tenant_id, .. }
            | Self::ItemDeleted { tenant_id, .. }
            | Self::InvoiceStatusChanged { tenant_id, .. } => tenant_id.as_deref(),
            Self::Unhandled { .. } => None,
        }
    }
}

/// Outcome of checking an inbound signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No shared secret is configured for this source.
    NotConfigured,
    Valid,
    /// Signature absent or wrong.
    Invalid,
}
