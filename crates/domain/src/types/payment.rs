//! Payment session and gateway callback types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::order::OrderStatus;

/// How the buyer settles a converted quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOption {
    PayNow,
    BuyNowPayLater,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Gateway-facing description of a payment session to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub tran_ref: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer: CustomerDetails,
}

/// Hosted payment page returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub payment_url: String,
    pub tran_ref: String,
}

/// Result of starting a payment for a quotation or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiated {
    pub payment_url: String,
    pub order_id: Uuid,
    pub tran_ref: String,
}

/// Terminal outcome of one transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Cancelled,
}

impl PaymentOutcome {
    /// Map a gateway status code onto an outcome.
    ///
    /// Return-URL and webhook deliveries spell the same result differently
    /// (`A`, `approved`, `success`...), so every known spelling is accepted.
    #[must_use]
    pub fn from_gateway_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "a" | "approved" | "success" | "succeeded" | "paid" | "captured" | "authorised"
            | "authorized" => Some(Self::Paid),
            "d" | "decline" | "declined" | "failed" | "failure" | "e" | "error" | "rejected"
            | "x" | "expired" => Some(Self::Failed),
            "c" | "cancel" | "cancelled" | "canceled" | "v" | "voided" => Some(Self::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn order_status(self) -> OrderStatus {
        match self {
            Self::Paid => OrderStatus::Paid,
            Self::Failed => OrderStatus::Failed,
            Self::Cancelled => OrderStatus::Cancelled,
        }
    }

    /// Lowercase label used in result-page redirects.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Gateway callback with field names normalised across delivery paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCallback {
    pub tran_ref: Option<String>,
    pub order_ref: Option<String>,
    pub status_code: Option<String>,
    pub message: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

impl NormalizedCallback {
    #[must_use]
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        self.status_code.as_deref().and_then(PaymentOutcome::from_gateway_code)
    }
}
