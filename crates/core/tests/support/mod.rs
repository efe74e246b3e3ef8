//! Shared test helpers for `orderbridge-core` integration tests.
//!
//! An in-memory store implements every persistence port so the services
//! can be exercised without SQLite; the ERP, gateway and sync queue are
//! recording fakes.

#![allow(dead_code)]

pub mod fakes;
pub mod store;

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use orderbridge_common::{Clock, MockClock};
use orderbridge_core::{ErpSyncEngine, PaymentOrchestrator, QuotationLifecycle};
use orderbridge_domain::{NewQuotation, NewQuotationItem, Party, PartyKind, QuotationConfig};
use uuid::Uuid;

pub use fakes::{FakeErp, FakeGateway, RecordingSink};
pub use store::MemoryStore;

pub const PUBLIC_BASE_URL: &str = "https://shop.test";

/// Every service wired to the same fakes.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub erp: Arc<FakeErp>,
    pub gateway: Arc<FakeGateway>,
    pub sink: Arc<RecordingSink>,
    pub clock: MockClock,
    pub org_id: Uuid,
    pub customer_id: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let org_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();
        store.add_party(Party {
            id: customer_id,
            org_id,
            kind: PartyKind::Customer,
            name: "Acme Trading".into(),
            email: Some("buyer@acme.test".into()),
            phone: None,
            external_contact_id: None,
        });

        Self {
            store,
            erp: Arc::new(FakeErp::default()),
            gateway: Arc::new(FakeGateway::default()),
            sink: Arc::new(RecordingSink::default()),
            clock: MockClock::at(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
            org_id,
            customer_id,
        }
    }

    pub fn lifecycle(&self) -> QuotationLifecycle {
        QuotationLifecycle::new(
            self.store.clone(),
            self.store.clone(),
            self.sink.clone(),
            Arc::new(self.clock.clone()),
        )
        .with_config(QuotationConfig {
            request_estimate_on_create: false,
            convert_estimate_on_approval: false,
        })
    }

    pub fn orchestrator(&self) -> PaymentOrchestrator {
        PaymentOrchestrator::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.gateway.clone(),
            self.sink.clone(),
            Arc::new(self.clock.clone()),
            PUBLIC_BASE_URL,
        )
    }

    pub fn sync_engine(&self) -> ErpSyncEngine {
        ErpSyncEngine::new(
            self.erp.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
        )
    }

    /// Draft quotation with one line per `(quantity, unit_price_cents)`.
    pub fn new_quotation(&self, lines: &[(i64, i64)]) -> NewQuotation {
        NewQuotation {
            org_id: self.org_id,
            branch_id: None,
            customer_id: Some(self.customer_id),
            currency: "usd".into(),
            valid_until: Some(self.clock.now() + Duration::days(30)),
            notes: None,
            items: lines
                .iter()
                .map(|&(quantity, unit_price_cents)| NewQuotationItem {
                    product_id: Uuid::new_v4(),
                    description: "Line".into(),
                    quantity,
                    unit_price_cents,
                })
                .collect(),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
