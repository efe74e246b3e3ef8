//! ERP connection state and the inbound webhook ledger.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

/// Data-centre region of an organization's ERP account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErpRegion {
    Us,
    Eu,
    In,
    Au,
    Jp,
    Ca,
    Cn,
    Sa,
}

impl_domain_status_conversions!(ErpRegion {
    Us => "us",
    Eu => "eu",
    In => "in",
    Au => "au",
    Jp => "jp",
    Ca => "ca",
    Cn => "cn",
    Sa => "sa",
});

impl ErpRegion {
    pub const ALL: [Self; 8] =
        [Self::Us, Self::Eu, Self::In, Self::Au, Self::Jp, Self::Ca, Self::Cn, Self::Sa];

    /// Parse the `location` value the ERP appends to its OAuth redirect.
    ///
    /// Accepts plain region codes as well as the domain suffix form
    /// (`com`, `com.au`, `com.cn`).
    #[must_use]
    pub fn from_location(location: &str) -> Option<Self> {
        match location.trim().to_ascii_lowercase().as_str() {
            "us" | "com" => Some(Self::Us),
            "eu" => Some(Self::Eu),
            "in" => Some(Self::In),
            "au" | "com.au" => Some(Self::Au),
            "jp" => Some(Self::Jp),
            "ca" => Some(Self::Ca),
            "cn" | "com.cn" => Some(Self::Cn),
            "sa" => Some(Self::Sa),
            _ => None,
        }
    }
}

/// OAuth connection between one organization and its ERP tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalConnection {
    pub org_id: Uuid,
    /// ERP-side organization id every API call is scoped by.
    pub tenant_id: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub region: ErpRegion,
    pub scope: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ExternalConnection {
    /// Whether the access token must be refreshed before use at `now`.
    ///
    /// Refresh starts strictly after `expires_at - window`.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now > self.expires_at - window
    }
}

/// Token material returned by an OAuth code exchange or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: i64,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventStatus {
    Pending,
    Processed,
    Failed,
}

impl_domain_status_conversions!(WebhookEventStatus {
    Pending => "pending",
    Processed => "processed",
    Failed => "failed",
});

/// Origin system of an inbound callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookSource {
    Gateway,
    Erp,
}

impl_domain_status_conversions!(WebhookSource {
    Gateway => "gateway",
    Erp => "erp",
});

/// Append-only audit row written for every inbound callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub source: WebhookSource,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub order_id: Option<Uuid>,
    pub status: WebhookEventStatus,
    pub error: Option<String>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    #[must_use]
    pub fn received(
        source: WebhookSource,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            source,
            event_type: event_type.into(),
            payload,
            order_id: None,
            status: WebhookEventStatus::Pending,
            error: None,
            correlation_id: None,
            created_at: now,
            processed_at: None,
        }
    }

    #[must_use]
    pub fn processed(mut self, now: DateTime<Utc>) -> Self {
        self.status = WebhookEventStatus::Processed;
        self.error = None;
        self.processed_at = Some(now);
        self
    }

    #[must_use]
    pub fn failed(mut self, error: impl Into<String>, now: DateTime<Utc>) -> Self {
        self.status = WebhookEventStatus::Failed;
        self.error = Some(error.into());
        self.processed_at = Some(now);
        self
    }
}
