//! Ports for the ERP API and the local mirrors it feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderbridge_domain::{
    ErpContactDraft, ErpDocumentDraft, ErpDocumentRef, ErpItem, ExternalConnection, Invoice,
    InvoiceStatus, Party, Product, Quotation, Result, UpsertOutcome,
};
use uuid::Uuid;

/// ERP operations scoped by the organization's connected tenant.
///
/// Implementations resolve the tenant and a fresh access token from the
/// organization id. Failures are `ExternalApi` carrying the HTTP status.
#[async_trait]
pub trait ErpApi: Send + Sync {
    /// Every catalog item, across all pages.
    async fn list_items(&self, org_id: Uuid) -> Result<Vec<ErpItem>>;

    /// Look up an existing contact by email.
    async fn find_contact(&self, org_id: Uuid, contact: &ErpContactDraft) -> Result<Option<String>>;

    async fn create_contact(&self, org_id: Uuid, contact: &ErpContactDraft) -> Result<String>;

    async fn create_estimate(&self, org_id: Uuid, draft: &ErpDocumentDraft)
        -> Result<ErpDocumentRef>;

    async fn convert_estimate_to_sales_order(
        &self,
        org_id: Uuid,
        estimate_id: &str,
    ) -> Result<ErpDocumentRef>;

    async fn create_sales_order(
        &self,
        org_id: Uuid,
        draft: &ErpDocumentDraft,
    ) -> Result<ErpDocumentRef>;

    async fn create_invoice(&self, org_id: Uuid, draft: &ErpDocumentDraft) -> Result<ErpDocumentRef>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert or update the product keyed by `(org, natural key)`.
    async fn upsert_product(
        &self,
        org_id: Uuid,
        item: &ErpItem,
        currency: &str,
    ) -> Result<UpsertOutcome>;

    /// Upsert all items in one transaction; any failure writes nothing.
    async fn upsert_products_atomically(
        &self,
        org_id: Uuid,
        items: &[ErpItem],
        currency: &str,
    ) -> Result<Vec<UpsertOutcome>>;

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn find_by_external_id(&self, org_id: Uuid, item_id: &str) -> Result<Option<Product>>;

    /// Returns whether a product was found and deactivated.
    async fn deactivate_by_external_id(&self, org_id: Uuid, item_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait PartyRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Party>>;

    async fn link_external_contact(&self, id: Uuid, contact_id: &str) -> Result<()>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<()>;

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Invoice>>;

    /// Returns whether a local invoice of `org_id` mirrors `invoice_id`.
    async fn update_status_by_external_id(
        &self,
        org_id: Uuid,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> Result<bool>;
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn find(&self, org_id: Uuid) -> Result<Option<ExternalConnection>>;

    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Option<ExternalConnection>>;

    async fn upsert(&self, connection: &ExternalConnection) -> Result<()>;

    /// Replace the stored tokens only while the row still expires at
    /// `previous_expires_at`. Returns whether this write won.
    async fn replace_if_unchanged(
        &self,
        connection: &ExternalConnection,
        previous_expires_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Converts an approved quotation's ERP estimate into a sales order.
#[async_trait]
pub trait EstimateConverter: Send + Sync {
    /// `Ok(None)` when the quotation has no estimate to convert.
    async fn convert_estimate(&self, quotation: &Quotation) -> Result<Option<ErpDocumentRef>>;
}
