//! Local catalog and the parties (customers, branches) mirrored as ERP
//! contacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub org_id: Uuid,
    /// Natural key of the upsert; the ERP item id when the ERP has no SKU.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub stock_on_hand: Option<i64>,
    pub external_item_id: String,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Whether an upsert inserted or replaced a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyKind {
    Customer,
    Branch,
}

impl_domain_status_conversions!(PartyKind {
    Customer => "customer",
    Branch => "branch",
});

/// A customer or branch that documents are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub org_id: Uuid,
    pub kind: PartyKind,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub external_contact_id: Option<String>,
}
