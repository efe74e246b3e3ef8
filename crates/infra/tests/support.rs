#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use orderbridge_domain::{
    Order, OrderItem, OrderStatus, Party, PartyKind, Quotation, QuotationItem, QuotationStatus,
};
use orderbridge_infra::database::DbManager;
use tempfile::TempDir;
use uuid::Uuid;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("orderbridge-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

pub fn customer(org_id: Uuid) -> Party {
    Party {
        id: Uuid::now_v7(),
        org_id,
        kind: PartyKind::Customer,
        name: "Acme Trading".into(),
        email: Some("buyer@acme.test".into()),
        phone: None,
        external_contact_id: None,
    }
}

pub fn quotation(org_id: Uuid, status: QuotationStatus) -> Quotation {
    let id = Uuid::now_v7();
    let now = Utc::now();
    let items = vec![
        QuotationItem {
            quotation_id: id,
            product_id: Uuid::now_v7(),
            description: "Pallet wrap".into(),
            quantity: 3,
            unit_price_cents: 1_250,
            subtotal_cents: 3_750,
        },
        QuotationItem {
            quotation_id: id,
            product_id: Uuid::now_v7(),
            description: "Strapping".into(),
            quantity: 1,
            unit_price_cents: 900,
            subtotal_cents: 900,
        },
    ];
    Quotation {
        id,
        org_id,
        branch_id: None,
        customer_id: None,
        number: format!("QT-{}", id.simple()),
        total_cents: 4_650,
        currency: "USD".into(),
        status,
        valid_until: Some(now + Duration::days(14)),
        notes: None,
        external_estimate_id: None,
        items,
        created_at: now,
        updated_at: now,
    }
}

pub fn order_for(quotation: &Quotation, status: OrderStatus) -> Order {
    let id = Uuid::now_v7();
    let now = Utc::now();
    Order {
        id,
        org_id: quotation.org_id,
        branch_id: quotation.branch_id,
        customer_id: quotation.customer_id,
        quotation_id: Some(quotation.id),
        number: format!("SO-{}", id.simple()),
        total_cents: quotation.total_cents,
        currency: quotation.currency.clone(),
        status,
        gateway_tran_ref: None,
        gateway_payment_id: None,
        external_sales_order_id: None,
        external_invoice_id: None,
        items: quotation
            .items
            .iter()
            .map(|item| OrderItem {
                order_id: id,
                product_id: item.product_id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents,
            })
            .collect(),
        created_at: now,
        updated_at: now,
    }
}
