//! Quotations: priced, unconfirmed proposals that may become an order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CommerceError, Result};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
    Converted,
}

impl_domain_status_conversions!(QuotationStatus {
    Draft => "draft",
    Sent => "sent",
    Approved => "approved",
    Rejected => "rejected",
    Expired => "expired",
    Converted => "converted",
});

impl QuotationStatus {
    pub const ALL: [Self; 6] =
        [Self::Draft, Self::Sent, Self::Approved, Self::Rejected, Self::Expired, Self::Converted];

    /// Statuses from which a quotation may be turned into an order.
    pub const CONVERTIBLE: [Self; 2] = [Self::Approved, Self::Sent];

    /// Statuses swept by expiry once `valid_until` has passed.
    pub const EXPIRABLE: [Self; 3] = [Self::Draft, Self::Sent, Self::Approved];

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Expired | Self::Converted)
    }

    /// Moves a caller may request through a status update.
    ///
    /// `Converted` never appears here: it is reached only by conversion,
    /// deferred payment or a paid callback.
    #[must_use]
    pub const fn allowed_targets(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Sent, Self::Approved, Self::Rejected, Self::Expired],
            Self::Sent => &[Self::Approved, Self::Rejected, Self::Expired],
            Self::Approved => &[Self::Rejected, Self::Expired],
            Self::Rejected | Self::Expired | Self::Converted => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_targets().contains(&next)
    }

    /// Returns `Ok(())` for an allowed requested move.
    pub fn ensure_transition(self, next: Self) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CommerceError::invalid_transition(self, next))
        }
    }
}

/// A priced line of a quotation. Immutable once the quotation leaves draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationItem {
    pub quotation_id: Uuid,
    pub product_id: Uuid,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: Uuid,
    pub org_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub number: String,
    pub total_cents: i64,
    pub currency: String,
    pub status: QuotationStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub external_estimate_id: Option<String>,
    pub items: Vec<QuotationItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    /// Sum of the item subtotals; the only source of `total_cents`.
    pub fn items_total(items: &[QuotationItem]) -> Result<i64> {
        items
            .iter()
            .try_fold(0_i64, |total, item| total.checked_add(item.subtotal_cents))
            .ok_or_else(|| CommerceError::Validation("quotation total overflows".into()))
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until < now)
    }
}

/// Requested line for a new quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuotationItem {
    pub product_id: Uuid,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl NewQuotationItem {
    /// Validates the line and prices it for the given quotation.
    pub fn priced_for(&self, quotation_id: Uuid) -> Result<QuotationItem> {
        if self.quantity <= 0 {
            return Err(CommerceError::Validation(format!(
                "quantity must be positive for product {}",
                self.product_id
            )));
        }
        if self.unit_price_cents < 0 {
            return Err(CommerceError::Validation(format!(
                "unit price must not be negative for product {}",
                self.product_id
            )));
        }
        let subtotal_cents = self.quantity.checked_mul(self.unit_price_cents).ok_or_else(|| {
            CommerceError::Validation(format!("line total overflows for product {}", self.product_id))
        })?;

        Ok(QuotationItem {
            quotation_id,
            product_id: self.product_id,
            description: self.description.clone(),
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            subtotal_cents,
        })
    }
}

/// Input for creating a quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub org_id: Uuid,
    #[serde(default)]
    pub branch_id: Option<Uuid>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub currency: String,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewQuotationItem>,
}
