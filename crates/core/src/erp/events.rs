//! Inbound ERP webhook handling.

use std::str::FromStr;
use std::sync::Arc;

use orderbridge_common::Clock;
use orderbridge_domain::{
    CommerceError, ErpEvent, InvoiceStatus, Result, SignatureCheck, UpsertOutcome, WebhookEvent,
    WebhookSource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ports::{CatalogRepository, ConnectionRepository, InvoiceRepository};
use crate::payments::ports::WebhookEventRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ErpEventOutcome {
    ProductUpserted { upsert: UpsertOutcome },
    ProductDeactivated { found: bool },
    InvoiceUpdated { status: InvoiceStatus, found: bool },
    Ignored,
}

pub struct ErpEventDispatcher {
    catalog: Arc<dyn CatalogRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    connections: Arc<dyn ConnectionRepository>,
    events: Arc<dyn WebhookEventRepository>,
    clock: Arc<dyn Clock>,
    catalog_currency: String,
    reject_invalid_signatures: bool,
}

impl ErpEventDispatcher {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        connections: Arc<dyn ConnectionRepository>,
        events: Arc<dyn WebhookEventRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            invoices,
            connections,
            events,
            clock,
            catalog_currency: "USD".to_owned(),
            reject_invalid_signatures: true,
        }
    }

    #[must_use]
    pub fn with_catalog_currency(mut self, currency: impl Into<String>) -> Self {
        self.catalog_currency = currency.into();
        self
    }

    #[must_use]
    pub fn reject_invalid_signatures(mut self, reject: bool) -> Self {
        self.reject_invalid_signatures = reject;
        self
    }

    /// Apply one delivery and append its audit row.
    ///
    /// An invalid signature is `Unauthorized` unless rejection is turned
    /// off, in which case the event is processed with a warning.
    pub async fn dispatch(
        &self,
        event_type: &str,
        event: ErpEvent,
        payload: serde_json::Value,
        signature: SignatureCheck,
    ) -> Result<ErpEventOutcome> {
        let now = self.clock.now();
        let mut record = WebhookEvent::received(WebhookSource::Erp, event_type, payload, now);
        record.correlation_id = event.tenant_id().map(str::to_owned);

        if signature == SignatureCheck::Invalid {
            if self.reject_invalid_signatures {
                warn!(event_type, "ERP webhook rejected: invalid signature");
                self.audit(record.failed("invalid signature", now)).await;
                return Err(CommerceError::Unauthorized("invalid ERP webhook signature".into()));
            }
            warn!(event_type, "ERP webhook signature mismatch, processing anyway");
        }

        match self.apply(event).await {
            Ok(outcome) => {
                info!(event_type, ?outcome, "ERP webhook handled");
                self.audit(record.processed(now)).await;
                Ok(outcome)
            }
            Err(err) => {
                warn!(event_type, error = %err, "ERP webhook failed");
                self.audit(record.failed(err.to_string(), now)).await;
                Err(err)
            }
        }
    }

    async fn apply(&self, event: ErpEvent) -> Result<ErpEventOutcome> {
        match event {
            ErpEvent::ItemUpserted { tenant_id, item } => {
                let org_id = self.resolve_org(tenant_id.as_deref()).await?;
                let upsert = self.catalog.upsert_product(org_id, &item, &self.catalog_currency).await?;
                Ok(ErpEventOutcome::ProductUpserted { upsert })
            }
            ErpEvent::ItemDeleted { tenant_id, item_id } => {
                let org_id = self.resolve_org(tenant_id.as_deref()).await?;
                let found = self.catalog.deactivate_by_external_id(org_id, &item_id).await?;
                Ok(ErpEventOutcome::ProductDeactivated { found })
            }
            ErpEvent::InvoiceStatusChanged { tenant_id, invoice_id, status } => {
                let org_id = self.resolve_org(tenant_id.as_deref()).await?;
                let status = InvoiceStatus::from_str(&status).map_err(CommerceError::Validation)?;
                let found =
                    self.invoices.update_status_by_external_id(org_id, &invoice_id, status).await?;
                if !found {
                    debug!(org_id = %org_id, invoice_id, "no local invoice mirrors this ERP invoice");
                }
                Ok(ErpEventOutcome::InvoiceUpdated { status, found })
            }
            ErpEvent::Unhandled { event_type } => {
                debug!(event_type, "ERP event ignored");
                Ok(ErpEventOutcome::Ignored)
            }
        }
    }

    async fn resolve_org(&self, tenant_id: Option<&str>) -> Result<Uuid> {
        let tenant_id = tenant_id
            .ok_or_else(|| CommerceError::Validation("ERP event has no organization_id".into()))?;
        self.connections
            .find_by_tenant(tenant_id)
            .await?
            .map(|connection| connection.org_id)
            .ok_or_else(|| CommerceError::NotFound(format!("ERP tenant {tenant_id}")))
    }

    async fn audit(&self, event: WebhookEvent) {
        if let Err(err) = self.events.append(&event).await {
            warn!(event_id = %event.id, error = %err, "failed to append webhook event");
        }
    }
}
