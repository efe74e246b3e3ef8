//! Repository workflows against the real schema on a temporary SQLite file.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use orderbridge_core::{
    CatalogRepository, ConnectionRepository, InvoiceRepository, OrderRepository, PartyRepository,
    QuotationRepository, WebhookEventRepository,
};
use orderbridge_domain::{
    CommerceError, ErpItem, ErpRegion, ExternalConnection, Invoice, InvoiceStatus, OrderStatus,
    QuotationStatus, UpsertOutcome, WebhookEvent, WebhookSource,
};
use orderbridge_infra::database::{
    SqliteCatalogRepository, SqliteConnectionRepository, SqliteInvoiceRepository,
    SqliteOrderRepository, SqlitePartyRepository, SqliteQuotationRepository,
    SqliteWebhookEventRepository,
};
use serde_json::json;
use support::{customer, order_for, quotation, TestDatabase};
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread")]
async fn quotation_round_trips_with_items_and_history() {
    let db = TestDatabase::new();
    let repo = SqliteQuotationRepository::new(Arc::clone(&db.manager));
    let quote = quotation(Uuid::now_v7(), QuotationStatus::Draft);

    repo.insert(&quote).await.expect("insert should succeed");
    let loaded = repo.find(quote.id).await.expect("find should succeed").expect("row exists");
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items[0].description, "Pallet wrap");
    assert_eq!(loaded.total_cents, 4_650);

    assert!(repo
        .update_status_if(quote.id, &[QuotationStatus::Draft], QuotationStatus::Sent, Some("emailed"))
        .await
        .expect("update should run"));
    // already moved on, so a second attempt from draft is rejected
    assert!(!repo
        .update_status_if(quote.id, &[QuotationStatus::Draft], QuotationStatus::Sent, None)
        .await
        .expect("update should run"));

    let history = repo.status_history(quote.id).await.expect("history should load");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], (None, QuotationStatus::Draft, None));
    assert_eq!(
        history[1],
        (Some(QuotationStatus::Draft), QuotationStatus::Sent, Some("emailed".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn conditional_update_on_missing_quotation_is_false() {
    let db = TestDatabase::new();
    let repo = SqliteQuotationRepository::new(Arc::clone(&db.manager));

    let moved = repo
        .update_status_if(Uuid::now_v7(), &[QuotationStatus::Draft], QuotationStatus::Sent, None)
        .await
        .expect("update should run");
    assert!(!moved);
}

#[tokio::test(flavor = "multi_thread")]
async fn find_expirable_skips_terminal_and_future_quotations() {
    let db = TestDatabase::new();
    let repo = SqliteQuotationRepository::new(Arc::clone(&db.manager));
    let org = Uuid::now_v7();
    let past = Utc::now() - Duration::days(1);

    let mut stale = quotation(org, QuotationStatus::Sent);
    stale.valid_until = Some(past);
    let mut rejected = quotation(org, QuotationStatus::Rejected);
    rejected.valid_until = Some(past);
    let fresh = quotation(org, QuotationStatus::Sent);

    for quote in [&stale, &rejected, &fresh] {
        repo.insert(quote).await.expect("insert should succeed");
    }

    let expirable = repo.find_expirable(Utc::now()).await.expect("query should succeed");
    let ids: Vec<Uuid> = expirable.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![stale.id]);
}

#[tokio::test(flavor = "multi_thread")]
async fn converting_insert_moves_quotation_and_rejects_second_order() {
    let db = TestDatabase::new();
    let quotations = SqliteQuotationRepository::new(Arc::clone(&db.manager));
    let orders = SqliteOrderRepository::new(Arc::clone(&db.manager));
    let quote = quotation(Uuid::now_v7(), QuotationStatus::Approved);
    quotations.insert(&quote).await.expect("insert should succeed");

    let first = order_for(&quote, OrderStatus::Pending);
    orders.insert_for_quotation(&first, true).await.expect("first conversion should succeed");

    let stored = quotations.find(quote.id).await.expect("find").expect("row");
    assert_eq!(stored.status, QuotationStatus::Converted);

    let second = order_for(&quote, OrderStatus::Pending);
    let err = orders.insert_for_quotation(&second, true).await.expect_err("second must fail");
    assert!(err.is_conflict(), "unexpected error: {err:?}");

    let by_quote = orders.find_by_quotation(quote.id).await.expect("find").expect("row");
    assert_eq!(by_quote.id, first.id);
    assert_eq!(by_quote.items.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn converting_insert_reports_missing_and_unconvertible_quotations() {
    let db = TestDatabase::new();
    let quotations = SqliteQuotationRepository::new(Arc::clone(&db.manager));
    let orders = SqliteOrderRepository::new(Arc::clone(&db.manager));

    let ghost = quotation(Uuid::now_v7(), QuotationStatus::Approved);
    let err = orders
        .insert_for_quotation(&order_for(&ghost, OrderStatus::Pending), true)
        .await
        .expect_err("missing quotation");
    assert!(matches!(err, CommerceError::NotFound(_)));

    let draft = quotation(Uuid::now_v7(), QuotationStatus::Draft);
    quotations.insert(&draft).await.expect("insert should succeed");
    let err = orders
        .insert_for_quotation(&order_for(&draft, OrderStatus::Pending), true)
        .await
        .expect_err("draft is not convertible");
    assert!(err.is_conflict());
    assert!(orders.find_by_quotation(draft.id).await.expect("find").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_conversions_create_exactly_one_order() {
    let db = TestDatabase::new();
    let quotations = SqliteQuotationRepository::new(Arc::clone(&db.manager));
    let orders = Arc::new(SqliteOrderRepository::new(Arc::clone(&db.manager)));
    let quote = quotation(Uuid::now_v7(), QuotationStatus::Approved);
    quotations.insert(&quote).await.expect("insert should succeed");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orders = Arc::clone(&orders);
        let order = order_for(&quote, OrderStatus::Pending);
        handles.push(tokio::spawn(async move { orders.insert_for_quotation(&order, true).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(()) => successes += 1,
            Err(err) => assert!(err.is_conflict(), "unexpected error: {err:?}"),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn order_transitions_are_compare_and_set() {
    let db = TestDatabase::new();
    let quotations = SqliteQuotationRepository::new(Arc::clone(&db.manager));
    let orders = SqliteOrderRepository::new(Arc::clone(&db.manager));
    let quote = quotation(Uuid::now_v7(), QuotationStatus::Approved);
    quotations.insert(&quote).await.expect("insert");
    let order = order_for(&quote, OrderStatus::Pending);
    orders.insert_for_quotation(&order, false).await.expect("insert");

    assert!(orders
        .assign_tran_ref(order.id, &OrderStatus::PAYABLE, "TRN-1")
        .await
        .expect("assign"));
    let found = orders.find_by_tran_ref("TRN-1").await.expect("find").expect("row");
    assert_eq!(found.status, OrderStatus::AwaitingPayment);

    assert!(orders
        .transition_status(order.id, &[OrderStatus::AwaitingPayment], OrderStatus::Paid, Some("PAY-9"))
        .await
        .expect("transition"));
    // a replayed callback finds the order already paid
    assert!(!orders
        .transition_status(order.id, &[OrderStatus::AwaitingPayment], OrderStatus::Paid, Some("PAY-10"))
        .await
        .expect("transition"));

    let paid = orders.find(order.id).await.expect("find").expect("row");
    assert_eq!(paid.status, OrderStatus::Paid);
    assert_eq!(paid.gateway_payment_id.as_deref(), Some("PAY-9"));
}

#[tokio::test(flavor = "multi_thread")]
async fn catalog_upsert_reports_created_then_updated() {
    let db = TestDatabase::new();
    let repo = SqliteCatalogRepository::new(Arc::clone(&db.manager));
    let org = Uuid::now_v7();
    let mut item = ErpItem {
        item_id: "4600000001".into(),
        name: "Pallet wrap".into(),
        sku: Some("PW-500".into()),
        description: None,
        rate_cents: 1_250,
        stock_on_hand: Some(40),
        active: true,
    };

    assert_eq!(repo.upsert_product(org, &item, "USD").await.expect("upsert"), UpsertOutcome::Created);
    item.rate_cents = 1_300;
    assert_eq!(repo.upsert_product(org, &item, "USD").await.expect("upsert"), UpsertOutcome::Updated);

    let product = repo.find_by_external_id(org, "4600000001").await.expect("find").expect("row");
    assert_eq!(product.price_cents, 1_300);
    assert_eq!(product.sku, "PW-500");

    assert!(repo.deactivate_by_external_id(org, "4600000001").await.expect("deactivate"));
    assert!(!repo.deactivate_by_external_id(org, "missing").await.expect("deactivate"));
    let product = repo.find_product(product.id).await.expect("find").expect("row");
    assert!(!product.active);
}

#[tokio::test(flavor = "multi_thread")]
async fn atomic_chunk_rolls_back_when_one_item_fails() {
    let db = TestDatabase::new();
    db.execute_batch(
        "CREATE TRIGGER reject_poison BEFORE INSERT ON products
         WHEN NEW.sku = 'POISON' BEGIN SELECT RAISE(ABORT, 'poisoned item'); END;",
    );
    let repo = SqliteCatalogRepository::new(Arc::clone(&db.manager));
    let org = Uuid::now_v7();
    let item = |id: &str, sku: &str| ErpItem {
        item_id: id.into(),
        name: format!("Item {id}"),
        sku: Some(sku.into()),
        description: None,
        rate_cents: 100,
        stock_on_hand: None,
        active: true,
    };

    let chunk = vec![item("1", "A"), item("2", "POISON"), item("3", "C")];
    repo.upsert_products_atomically(org, &chunk, "USD").await.expect_err("chunk must fail");
    assert!(repo.list_products(org).await.expect("list").is_empty());

    let chunk = vec![item("1", "A"), item("3", "C")];
    let outcomes = repo.upsert_products_atomically(org, &chunk, "USD").await.expect("chunk");
    assert_eq!(outcomes, vec![UpsertOutcome::Created, UpsertOutcome::Created]);
}

#[tokio::test(flavor = "multi_thread")]
async fn party_links_external_contact() {
    let db = TestDatabase::new();
    let repo = SqlitePartyRepository::new(Arc::clone(&db.manager));
    let party = customer(Uuid::now_v7());
    repo.insert(&party).await.expect("insert");

    repo.link_external_contact(party.id, "C-77").await.expect("link");
    let stored = repo.find(party.id).await.expect("find").expect("row");
    assert_eq!(stored.external_contact_id.as_deref(), Some("C-77"));
}

#[tokio::test(flavor = "multi_thread")]
async fn one_invoice_per_order_and_status_follows_erp_id() {
    let db = TestDatabase::new();
    let quotations = SqliteQuotationRepository::new(Arc::clone(&db.manager));
    let orders = SqliteOrderRepository::new(Arc::clone(&db.manager));
    let invoices = SqliteInvoiceRepository::new(Arc::clone(&db.manager));
    let quote = quotation(Uuid::now_v7(), QuotationStatus::Approved);
    quotations.insert(&quote).await.expect("insert");
    let order = order_for(&quote, OrderStatus::Paid);
    orders.insert_for_quotation(&order, true).await.expect("insert");

    let invoice = Invoice {
        id: Uuid::now_v7(),
        org_id: order.org_id,
        order_id: order.id,
        number: "INV-000001".into(),
        status: InvoiceStatus::Sent,
        total_cents: order.total_cents,
        pdf_url: None,
        external_invoice_id: Some("ERP-INV-1".into()),
    };
    invoices.insert(&invoice).await.expect("insert");

    let duplicate = Invoice { id: Uuid::now_v7(), ..invoice.clone() };
    let err = invoices.insert(&duplicate).await.expect_err("second invoice");
    assert!(err.is_conflict());

    assert!(!invoices
        .update_status_by_external_id(Uuid::now_v7(), "ERP-INV-1", InvoiceStatus::Void)
        .await
        .expect("update"));
    assert_eq!(
        invoices.find_by_order(order.id).await.expect("find").expect("row").status,
        InvoiceStatus::Sent
    );
    assert!(invoices
        .update_status_by_external_id(order.org_id, "ERP-INV-1", InvoiceStatus::Paid)
        .await
        .expect("update"));
    assert!(!invoices
        .update_status_by_external_id(order.org_id, "ERP-INV-404", InvoiceStatus::Paid)
        .await
        .expect("update"));
    let stored = invoices.find_by_order(order.id).await.expect("find").expect("row");
    assert_eq!(stored.status, InvoiceStatus::Paid);
}

#[tokio::test(flavor = "multi_thread")]
async fn token_replace_only_wins_against_the_expiry_it_read() {
    let db = TestDatabase::new();
    let repo = SqliteConnectionRepository::new(Arc::clone(&db.manager));
    let now = Utc::now();
    let connection = ExternalConnection {
        org_id: Uuid::now_v7(),
        tenant_id: Some("60012345".into()),
        access_token: "at-1".into(),
        refresh_token: "rt-1".into(),
        expires_at: now + Duration::minutes(2),
        region: ErpRegion::Eu,
        scope: None,
        updated_at: now,
    };
    repo.upsert(&connection).await.expect("upsert");

    let stored = repo.find(connection.org_id).await.expect("find").expect("row");
    let refreshed = ExternalConnection {
        access_token: "at-2".into(),
        expires_at: now + Duration::hours(1),
        ..stored.clone()
    };
    assert!(repo.replace_if_unchanged(&refreshed, stored.expires_at).await.expect("replace"));

    let loser = ExternalConnection { access_token: "at-3".into(), ..refreshed.clone() };
    assert!(!repo.replace_if_unchanged(&loser, stored.expires_at).await.expect("replace"));

    let by_tenant = repo.find_by_tenant("60012345").await.expect("find").expect("row");
    assert_eq!(by_tenant.access_token, "at-2");
    assert_eq!(by_tenant.region, ErpRegion::Eu);
}

#[tokio::test(flavor = "multi_thread")]
async fn webhook_ledger_lists_failures_newest_first() {
    let db = TestDatabase::new();
    let repo = SqliteWebhookEventRepository::new(Arc::clone(&db.manager));
    let order_id = Uuid::now_v7();

    let now = Utc::now();

    let mut ok = WebhookEvent::received(
        WebhookSource::Gateway,
        "payment.callback",
        json!({"tran_ref": "TRN-1"}),
        now,
    )
    .processed(now);
    ok.order_id = Some(order_id);
    let older = WebhookEvent::received(WebhookSource::Erp, "item.updated", json!({}), now)
        .failed("first failure", now);
    let newer = WebhookEvent::received(
        WebhookSource::Erp,
        "item.deleted",
        json!({}),
        now + Duration::seconds(1),
    )
    .failed("second failure", now);

    for event in [&ok, &older, &newer] {
        repo.append(event).await.expect("append");
    }

    let failed = repo.list_failed(10).await.expect("list");
    let types: Vec<&str> = failed.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["item.deleted", "item.updated"]);
    assert_eq!(repo.list_failed(1).await.expect("list").len(), 1);

    let for_order = repo.find_by_order(order_id).await.expect("find");
    assert_eq!(for_order.len(), 1);
    assert_eq!(for_order[0].payload, json!({"tran_ref": "TRN-1"}));
}
