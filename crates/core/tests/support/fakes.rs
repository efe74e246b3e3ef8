//! Recording fakes for the ERP, the payment gateway and the sync queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use orderbridge_core::{ErpApi, PaymentGateway, SyncJob, SyncJobSink};
use orderbridge_domain::{
    CommerceError, ErpContactDraft, ErpDocumentDraft, ErpDocumentRef, ErpItem, PaymentRequest,
    PaymentSession, Result as DomainResult,
};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeErp {
    pub items: Mutex<Vec<ErpItem>>,
    pub fail_list: AtomicBool,
    pub fail_invoice: AtomicBool,
    pub contacts_created: AtomicUsize,
    pub estimates: Mutex<Vec<ErpDocumentDraft>>,
    pub sales_orders: Mutex<Vec<ErpDocumentDraft>>,
    pub converted_estimates: Mutex<Vec<String>>,
    pub invoices: Mutex<Vec<ErpDocumentDraft>>,
}

impl FakeErp {
    pub fn with_items(items: Vec<ErpItem>) -> Self {
        let erp = Self::default();
        *erp.items.lock() = items;
        erp
    }

    pub fn sales_order_count(&self) -> usize {
        self.sales_orders.lock().len() + self.converted_estimates.lock().len()
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.lock().len()
    }

    fn document(prefix: &str) -> ErpDocumentRef {
        let id = format!("{prefix}-{}", Uuid::new_v4().simple());
        ErpDocumentRef {
            number: Some(format!("{}-0001", prefix.to_uppercase())),
            status: Some("draft".into()),
            url: Some(format!("https://erp.test/{id}")),
            id,
        }
    }
}

pub fn erp_item(item_id: &str, sku: Option<&str>, name: &str, rate_cents: i64) -> ErpItem {
    ErpItem {
        item_id: item_id.into(),
        name: name.into(),
        sku: sku.map(Into::into),
        description: None,
        rate_cents,
        stock_on_hand: Some(10),
        active: true,
    }
}

#[async_trait]
impl ErpApi for FakeErp {
    async fn list_items(&self, _org_id: Uuid) -> DomainResult<Vec<ErpItem>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(CommerceError::external_api("items unavailable", Some(503)));
        }
        Ok(self.items.lock().clone())
    }

    async fn find_contact(
        &self,
        _org_id: Uuid,
        _contact: &ErpContactDraft,
    ) -> DomainResult<Option<String>> {
        Ok(None)
    }

    async fn create_contact(&self, _org_id: Uuid, _contact: &ErpContactDraft) -> DomainResult<String> {
        // a real ERP call suspends; let concurrent jobs interleave here
        tokio::task::yield_now().await;
        let n = self.contacts_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("contact-{n}"))
    }

    async fn create_estimate(
        &self,
        _org_id: Uuid,
        draft: &ErpDocumentDraft,
    ) -> DomainResult<ErpDocumentRef> {
        self.estimates.lock().push(draft.clone());
        Ok(Self::document("est"))
    }

    async fn convert_estimate_to_sales_order(
        &self,
        _org_id: Uuid,
        estimate_id: &str,
    ) -> DomainResult<ErpDocumentRef> {
        self.converted_estimates.lock().push(estimate_id.to_owned());
        Ok(Self::document("so"))
    }

    async fn create_sales_order(
        &self,
        _org_id: Uuid,
        draft: &ErpDocumentDraft,
    ) -> DomainResult<ErpDocumentRef> {
        tokio::task::yield_now().await;
        self.sales_orders.lock().push(draft.clone());
        Ok(Self::document("so"))
    }

    async fn create_invoice(
        &self,
        _org_id: Uuid,
        draft: &ErpDocumentDraft,
    ) -> DomainResult<ErpDocumentRef> {
        if self.fail_invoice.load(Ordering::SeqCst) {
            return Err(CommerceError::external_api("invoice rejected", Some(400)));
        }
        self.invoices.lock().push(draft.clone());
        Ok(Self::document("inv"))
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub fail: AtomicBool,
    /// Reference the gateway substitutes for ours, if any.
    pub echo_tran_ref: Mutex<Option<String>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate_payment(&self, request: &PaymentRequest) -> DomainResult<PaymentSession> {
        self.requests.lock().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(CommerceError::gateway("store not active", Some(400)));
        }
        let tran_ref = self.echo_tran_ref.lock().clone().unwrap_or_else(|| request.tran_ref.clone());
        Ok(PaymentSession {
            payment_url: format!("https://pay.test/page/{tran_ref}"),
            tran_ref,
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub jobs: Mutex<Vec<SyncJob>>,
    pub closed: AtomicBool,
}

impl RecordingSink {
    pub fn jobs(&self) -> Vec<SyncJob> {
        self.jobs.lock().clone()
    }
}

impl SyncJobSink for RecordingSink {
    fn enqueue(&self, job: SyncJob) -> DomainResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CommerceError::Internal("sync queue closed".into()));
        }
        self.jobs.lock().push(job);
        Ok(())
    }
}
