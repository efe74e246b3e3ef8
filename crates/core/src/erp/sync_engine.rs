//! ERP sync engine.
//!
//! Catalog pulls run through the batch processor so one bad item never
//! aborts the rest. Document pushes are a best-effort pipeline: each step
//! stores the external id it obtained, and a step whose id is already
//! stored is skipped, so rerunning a job never duplicates ERP documents.
//! Jobs for the same order run one at a time, so a second job only starts
//! after the first has stored its ids.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use orderbridge_domain::{
    CommerceError, ErpContactDraft, ErpDocumentDraft, ErpDocumentRef, ErpItem, ErpLineItem,
    Invoice, InvoiceStatus, Order, OrderStatus, Quotation, QuotationStatus, Result, UpsertOutcome,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::ports::{CatalogRepository, ErpApi, EstimateConverter, InvoiceRepository, PartyRepository};
use crate::batch::{BatchConfig, BatchObserver, BatchOutcome, BatchProcessor, TransactionScope};
use crate::keyed_locks::KeyedLocks;
use crate::lifecycle::ports::{OrderRepository, QuotationRepository};
use crate::sync::ports::SyncJobHandler;
use crate::sync::{SyncJob, SyncJobKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSyncOptions {
    pub org_id: Uuid,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    /// Commit each chunk as a whole or not at all.
    #[serde(default)]
    pub transactional: bool,
}

impl CatalogSyncOptions {
    #[must_use]
    pub fn for_org(org_id: Uuid) -> Self {
        Self { org_id, batch_size: None, max_concurrent: None, transactional: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemFailure {
    /// Natural key of the item (SKU, else ERP item id).
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSyncReport {
    pub synced: usize,
    pub errors: usize,
    pub total_fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<CatalogItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Skipped(String),
    Failed(String),
}

impl StepStatus {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSyncReport {
    pub order_id: Uuid,
    pub contact: StepStatus,
    pub sales_order: StepStatus,
    pub invoice: StepStatus,
}

impl DocumentSyncReport {
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        [("contact", &self.contact), ("sales_order", &self.sales_order), ("invoice", &self.invoice)]
            .into_iter()
            .filter_map(|(step, status)| match status {
                StepStatus::Failed(message) => Some(format!("{step}: {message}")),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct UpsertCounters {
    created: AtomicUsize,
    updated: AtomicUsize,
}

impl UpsertCounters {
    fn record(&self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created.fetch_add(1, Ordering::Relaxed),
            UpsertOutcome::Updated => self.updated.fetch_add(1, Ordering::Relaxed),
        };
    }
}

pub struct ErpSyncEngine {
    erp: Arc<dyn ErpApi>,
    catalog: Arc<dyn CatalogRepository>,
    parties: Arc<dyn PartyRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    quotations: Arc<dyn QuotationRepository>,
    orders: Arc<dyn OrderRepository>,
    batch: BatchConfig,
    catalog_currency: String,
    observer: Option<Arc<dyn BatchObserver>>,
    order_locks: KeyedLocks<Uuid>,
}

impl ErpSyncEngine {
    pub fn new(
        erp: Arc<dyn ErpApi>,
        catalog: Arc<dyn CatalogRepository>,
        parties: Arc<dyn PartyRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        quotations: Arc<dyn QuotationRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            erp,
            catalog,
            parties,
            invoices,
            quotations,
            orders,
            batch: BatchConfig::default(),
            catalog_currency: "USD".to_owned(),
            observer: None,
            order_locks: KeyedLocks::new(),
        }
    }

    #[must_use]
    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    #[must_use]
    pub fn with_catalog_currency(mut self, currency: impl Into<String>) -> Self {
        self.catalog_currency = currency.into();
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Pull the organization's ERP catalog into local products.
    ///
    /// Fetch failures fail the whole call; item failures are reported.
    pub async fn sync_catalog(&self, options: CatalogSyncOptions) -> Result<CatalogSyncReport> {
        let org_id = options.org_id;
        let items = self.erp.list_items(org_id).await?;
        let total_fetched = items.len();

        let mut processor = BatchProcessor::new(BatchConfig {
            batch_size: options.batch_size.unwrap_or(self.batch.batch_size),
            max_concurrent: options.max_concurrent.unwrap_or(self.batch.max_concurrent),
        });
        if let Some(observer) = &self.observer {
            processor = processor.with_observer(Arc::clone(observer));
        }

        let counters = Arc::new(UpsertCounters::default());
        let outcome = if options.transactional {
            let scope = CatalogUpsertScope {
                catalog: Arc::clone(&self.catalog),
                org_id,
                currency: self.catalog_currency.clone(),
                counters: Arc::clone(&counters),
            };
            processor.process_transactional(items, &scope).await
        } else {
            let catalog = Arc::clone(&self.catalog);
            let currency = self.catalog_currency.clone();
            let counters = Arc::clone(&counters);
            processor
                .process(items, move |item: ErpItem| {
                    let catalog = Arc::clone(&catalog);
                    let currency = currency.clone();
                    let counters = Arc::clone(&counters);
                    async move {
                        validate_item(&item)?;
                        let upserted = catalog.upsert_product(org_id, &item, &currency).await?;
                        counters.record(upserted);
                        Ok(())
                    }
                })
                .await
        };

        let report = catalog_report(outcome, total_fetched, &counters);
        info!(
            org_id = %org_id,
            total_fetched,
            synced = report.synced,
            errors = report.errors,
            created = report.created,
            updated = report.updated,
            "catalog sync finished"
        );
        Ok(report)
    }

    /// Create the ERP estimate for a quotation and mark it sent.
    ///
    /// Returns `None` when the quotation already has an estimate or has no
    /// party to address it to.
    pub async fn push_quotation_estimate(&self, quotation_id: Uuid) -> Result<Option<ErpDocumentRef>> {
        let quotation = self
            .quotations
            .find(quotation_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("quotation {quotation_id}")))?;
        if quotation.external_estimate_id.is_some() {
            return Ok(None);
        }
        let Some(party_id) = quotation.customer_id.or(quotation.branch_id) else {
            info!(quotation_id = %quotation_id, "quotation has no party, estimate not requested");
            return Ok(None);
        };

        let contact_id = self.ensure_contact(quotation.org_id, party_id).await?.0;
        let draft = ErpDocumentDraft {
            contact_id,
            reference_number: quotation.number.clone(),
            currency: quotation.currency.clone(),
            line_items: self
                .line_items(
                    quotation
                        .items
                        .iter()
                        .map(|i| (i.product_id, &i.description, i.quantity, i.unit_price_cents)),
                )
                .await,
            notes: quotation.notes.clone(),
            sales_order_id: None,
        };

        let estimate = self.erp.create_estimate(quotation.org_id, &draft).await?;
        self.quotations.set_external_estimate_id(quotation_id, &estimate.id).await?;
        let sent = self
            .quotations
            .update_status_if(
                quotation_id,
                &[QuotationStatus::Draft],
                QuotationStatus::Sent,
                Some("estimate created in ERP"),
            )
            .await?;
        info!(quotation_id = %quotation_id, estimate_id = %estimate.id, sent, "estimate pushed");
        Ok(Some(estimate))
    }

    /// Push contact, sales order and invoice for an order.
    ///
    /// Never fails on a step; the report says what happened. Only a missing
    /// order or a store read failure is an error.
    pub async fn sync_order_documents(&self, order_id: Uuid) -> Result<DocumentSyncReport> {
        self.order_locks.with_lock(order_id, self.push_order_documents(order_id)).await
    }

    async fn push_order_documents(&self, order_id: Uuid) -> Result<DocumentSyncReport> {
        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("order {order_id}")))?;

        let mut report = DocumentSyncReport {
            order_id,
            contact: StepStatus::Done,
            sales_order: StepStatus::Skipped("no ERP contact".into()),
            invoice: StepStatus::Skipped("no ERP sales order".into()),
        };

        let contact_id = match order.customer_id.or(order.branch_id) {
            None => {
                report.contact = StepStatus::Skipped("order has no customer or branch".into());
                None
            }
            Some(party_id) => match self.ensure_contact(order.org_id, party_id).await {
                Ok((contact_id, created)) => {
                    if !created {
                        report.contact = StepStatus::Skipped("contact already linked".into());
                    }
                    Some(contact_id)
                }
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "ERP contact step failed");
                    report.contact = StepStatus::Failed(err.to_string());
                    None
                }
            },
        };

        let sales_order_id = match (&order.external_sales_order_id, contact_id.as_deref()) {
            (Some(existing), _) => {
                report.sales_order = StepStatus::Skipped("sales order already synced".into());
                Some(existing.clone())
            }
            (None, None) => None,
            (None, Some(contact_id)) => match self.push_sales_order(&order, contact_id).await {
                Ok(sales_order) => {
                    report.sales_order = StepStatus::Done;
                    Some(sales_order.id)
                }
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "ERP sales order step failed");
                    report.sales_order = StepStatus::Failed(err.to_string());
                    None
                }
            },
        };

        report.invoice = match (&order.external_invoice_id, contact_id, sales_order_id) {
            (Some(_), _, _) => StepStatus::Skipped("invoice already synced".into()),
            (None, None, _) => StepStatus::Skipped("no ERP contact".into()),
            (None, _, None) => StepStatus::Skipped("no ERP sales order".into()),
            (None, Some(_), Some(_)) if order.status != OrderStatus::Paid => {
                StepStatus::Skipped(format!("order is {}", order.status))
            }
            (None, Some(contact_id), Some(sales_order_id)) => {
                match self.push_invoice(&order, &contact_id, &sales_order_id).await {
                    Ok(()) => StepStatus::Done,
                    Err(err) => {
                        warn!(order_id = %order_id, error = %err, "ERP invoice step failed");
                        StepStatus::Failed(err.to_string())
                    }
                }
            }
        };

        info!(
            order_id = %order_id,
            contact = ?report.contact,
            sales_order = ?report.sales_order,
            invoice = ?report.invoice,
            "order documents synced"
        );
        Ok(report)
    }

    /// Resolve the party's ERP contact, creating and linking it if needed.
    /// The flag tells whether this call linked a new contact.
    async fn ensure_contact(&self, org_id: Uuid, party_id: Uuid) -> Result<(String, bool)> {
        let party = self
            .parties
            .find(party_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("party {party_id}")))?;
        if let Some(contact_id) = party.external_contact_id {
            return Ok((contact_id, false));
        }

        let draft = ErpContactDraft { name: party.name, email: party.email, phone: party.phone };
        let contact_id = match self.erp.find_contact(org_id, &draft).await? {
            Some(existing) => existing,
            None => self.erp.create_contact(org_id, &draft).await?,
        };
        self.parties.link_external_contact(party_id, &contact_id).await?;
        Ok((contact_id, true))
    }

    async fn push_sales_order(&self, order: &Order, contact_id: &str) -> Result<ErpDocumentRef> {
        let estimate_id = match order.quotation_id {
            Some(quotation_id) => self
                .quotations
                .find(quotation_id)
                .await?
                .and_then(|q| q.external_estimate_id),
            None => None,
        };

        let sales_order = match estimate_id {
            Some(estimate_id) => {
                self.erp.convert_estimate_to_sales_order(order.org_id, &estimate_id).await?
            }
            None => {
                let draft = self.order_draft(order, contact_id, None).await;
                self.erp.create_sales_order(order.org_id, &draft).await?
            }
        };
        self.orders.set_external_sales_order_id(order.id, &sales_order.id).await?;
        Ok(sales_order)
    }

    async fn push_invoice(&self, order: &Order, contact_id: &str, sales_order_id: &str) -> Result<()> {
        let draft = self.order_draft(order, contact_id, Some(sales_order_id.to_owned())).await;
        let document = self.erp.create_invoice(order.org_id, &draft).await?;
        self.orders.set_external_invoice_id(order.id, &document.id).await?;

        if self.invoices.find_by_order(order.id).await?.is_none() {
            let status = document
                .status
                .as_deref()
                .and_then(|s| InvoiceStatus::from_str(s).ok())
                .unwrap_or(InvoiceStatus::Draft);
            let invoice = Invoice {
                id: Uuid::now_v7(),
                org_id: order.org_id,
                order_id: order.id,
                number: document.number.clone().unwrap_or_else(|| order.number.clone()),
                status,
                total_cents: order.total_cents,
                pdf_url: document.url.clone(),
                external_invoice_id: Some(document.id.clone()),
            };
            self.invoices.insert(&invoice).await?;
        }
        Ok(())
    }

    async fn order_draft(
        &self,
        order: &Order,
        contact_id: &str,
        sales_order_id: Option<String>,
    ) -> ErpDocumentDraft {
        ErpDocumentDraft {
            contact_id: contact_id.to_owned(),
            reference_number: order.number.clone(),
            currency: order.currency.clone(),
            line_items: self
                .line_items(
                    order
                        .items
                        .iter()
                        .map(|i| (i.product_id, &i.description, i.quantity, i.unit_price_cents)),
                )
                .await,
            notes: None,
            sales_order_id,
        }
    }

    /// Map local lines to ERP lines, linking the ERP item when known.
    async fn line_items<'a>(
        &self,
        lines: impl Iterator<Item = (Uuid, &'a String, i64, i64)>,
    ) -> Vec<ErpLineItem> {
        let mut out = Vec::new();
        for (product_id, description, quantity, unit_price_cents) in lines {
            let product = match self.catalog.find_product(product_id).await {
                Ok(product) => product,
                Err(err) => {
                    warn!(product_id = %product_id, error = %err, "product lookup failed");
                    None
                }
            };
            let name = match (&product, description.is_empty()) {
                (Some(product), true) => product.name.clone(),
                _ => description.clone(),
            };
            out.push(ErpLineItem {
                item_id: product.map(|p| p.external_item_id),
                name,
                quantity,
                rate_cents: unit_price_cents,
            });
        }
        out
    }
}

#[async_trait]
impl EstimateConverter for ErpSyncEngine {
    async fn convert_estimate(&self, quotation: &Quotation) -> Result<Option<ErpDocumentRef>> {
        let Some(estimate_id) = &quotation.external_estimate_id else {
            return Ok(None);
        };
        let sales_order =
            self.erp.convert_estimate_to_sales_order(quotation.org_id, estimate_id).await?;
        Ok(Some(sales_order))
    }
}

#[async_trait]
impl SyncJobHandler for ErpSyncEngine {
    async fn handle(&self, job: &SyncJob) -> Result<()> {
        match job.kind {
            SyncJobKind::OrderDocuments { order_id } => {
                let report = self.sync_order_documents(order_id).await?;
                let failures = report.failures();
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(CommerceError::external_api(failures.join("; "), None))
                }
            }
            SyncJobKind::QuotationEstimate { quotation_id } => {
                self.push_quotation_estimate(quotation_id).await.map(|_| ())
            }
        }
    }
}

/// Wraps one chunk of catalog upserts in a single store transaction.
struct CatalogUpsertScope {
    catalog: Arc<dyn CatalogRepository>,
    org_id: Uuid,
    currency: String,
    counters: Arc<UpsertCounters>,
}

#[async_trait]
impl TransactionScope<ErpItem> for CatalogUpsertScope {
    type Tx = Vec<ErpItem>;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(Vec::new())
    }

    async fn apply(&self, tx: &mut Self::Tx, item: &ErpItem) -> Result<()> {
        validate_item(item)?;
        tx.push(item.clone());
        Ok(())
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        let outcomes =
            self.catalog.upsert_products_atomically(self.org_id, &tx, &self.currency).await?;
        for outcome in outcomes {
            self.counters.record(outcome);
        }
        Ok(())
    }

    async fn rollback(&self, _tx: Self::Tx) {}
}

fn validate_item(item: &ErpItem) -> Result<()> {
    let has_sku = item.sku.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !has_sku && item.name.trim().is_empty() {
        return Err(CommerceError::Validation(format!(
            "ERP item {} has neither SKU nor name",
            item.item_id
        )));
    }
    Ok(())
}

fn catalog_report(
    outcome: BatchOutcome<ErpItem>,
    total_fetched: usize,
    counters: &UpsertCounters,
) -> CatalogSyncReport {
    CatalogSyncReport {
        synced: outcome.succeeded.len(),
        errors: outcome.total_errors,
        total_fetched,
        created: counters.created.load(Ordering::Relaxed),
        updated: counters.updated.load(Ordering::Relaxed),
        failures: outcome
            .failed
            .into_iter()
            .map(|failed| CatalogItemFailure {
                key: failed.item.natural_key().to_owned(),
                error: failed.error.to_string(),
            })
            .collect(),
    }
}
