//! Background ERP sync jobs.
//!
//! Services never await ERP side effects inline; they enqueue a [`SyncJob`]
//! that a supervised worker runs later. Every job carries a correlation id
//! so its outcome can be traced in the logs.

pub mod ports;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use self::ports::SyncJobSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncJobKind {
    /// Push contact, sales order and invoice for a paid or converted order.
    OrderDocuments { order_id: Uuid },
    /// Create the ERP estimate for a freshly created quotation.
    QuotationEstimate { quotation_id: Uuid },
}

impl SyncJobKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OrderDocuments { .. } => "order_documents",
            Self::QuotationEstimate { .. } => "quotation_estimate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub correlation_id: Uuid,
    pub kind: SyncJobKind,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncJob {
    #[must_use]
    pub fn new(kind: SyncJobKind, enqueued_at: DateTime<Utc>) -> Self {
        Self { correlation_id: Uuid::now_v7(), kind, enqueued_at }
    }

    #[must_use]
    pub fn order_documents(order_id: Uuid, enqueued_at: DateTime<Utc>) -> Self {
        Self::new(SyncJobKind::OrderDocuments { order_id }, enqueued_at)
    }

    #[must_use]
    pub fn quotation_estimate(quotation_id: Uuid, enqueued_at: DateTime<Utc>) -> Self {
        Self::new(SyncJobKind::QuotationEstimate { quotation_id }, enqueued_at)
    }
}

/// Enqueue without letting a full or closed queue fail the caller.
pub(crate) fn enqueue_best_effort(sink: &dyn SyncJobSink, job: SyncJob) {
    let correlation_id = job.correlation_id;
    let kind = job.kind.label();
    if let Err(err) = sink.enqueue(job) {
        warn!(%correlation_id, kind, error = %err, "failed to enqueue ERP sync job");
    }
}
