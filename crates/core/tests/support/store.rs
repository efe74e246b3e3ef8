//! In-memory implementation of every persistence port.
//!
//! One mutex guards all tables, so the multi-row writes the SQLite store
//! does in a transaction are atomic here too.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderbridge_core::{
    CatalogRepository, ConnectionRepository, InvoiceRepository, OrderRepository, PartyRepository,
    QuotationRepository, WebhookEventRepository,
};
use orderbridge_domain::{
    CommerceError, ErpItem, ExternalConnection, Invoice, InvoiceStatus, Order, OrderStatus, Party,
    Product, Quotation, QuotationStatus, Result as DomainResult, UpsertOutcome, WebhookEvent,
    WebhookEventStatus,
};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    quotations: HashMap<Uuid, Quotation>,
    orders: HashMap<Uuid, Order>,
    events: Vec<WebhookEvent>,
    products: HashMap<Uuid, Product>,
    parties: HashMap<Uuid, Party>,
    invoices: HashMap<Uuid, Invoice>,
    connections: HashMap<Uuid, ExternalConnection>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Natural keys whose upsert fails, to simulate a store error.
    poisoned_keys: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn add_party(&self, party: Party) {
        self.tables.lock().parties.insert(party.id, party);
    }

    pub fn party(&self, id: Uuid) -> Option<Party> {
        self.tables.lock().parties.get(&id).cloned()
    }

    pub fn add_connection(&self, connection: ExternalConnection) {
        self.tables.lock().connections.insert(connection.org_id, connection);
    }

    pub fn add_invoice(&self, invoice: Invoice) {
        self.tables.lock().invoices.insert(invoice.id, invoice);
    }

    pub fn quotation(&self, id: Uuid) -> Option<Quotation> {
        self.tables.lock().quotations.get(&id).cloned()
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.tables.lock().orders.get(&id).cloned()
    }

    pub fn orders_for_quotation(&self, quotation_id: Uuid) -> Vec<Order> {
        self.tables
            .lock()
            .orders
            .values()
            .filter(|o| o.quotation_id == Some(quotation_id))
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Vec<WebhookEvent> {
        self.tables.lock().events.clone()
    }

    pub fn events_with_status(&self, status: WebhookEventStatus) -> Vec<WebhookEvent> {
        self.events().into_iter().filter(|e| e.status == status).collect()
    }

    pub fn products(&self) -> Vec<Product> {
        self.tables.lock().products.values().cloned().collect()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.tables.lock().invoices.values().cloned().collect()
    }

    pub fn poison_key(&self, key: &str) {
        self.poisoned_keys.lock().insert(key.to_owned());
    }

    /// Force a quotation into a status, bypassing the lifecycle rules.
    pub fn force_quotation_status(&self, id: Uuid, status: QuotationStatus) {
        if let Some(q) = self.tables.lock().quotations.get_mut(&id) {
            q.status = status;
        }
    }

    fn upsert_locked(
        tables: &mut Tables,
        org_id: Uuid,
        item: &ErpItem,
        currency: &str,
    ) -> UpsertOutcome {
        let key = item.natural_key().to_owned();
        let existing = tables.products.values_mut().find(|p| p.org_id == org_id && p.sku == key);
        match existing {
            Some(product) => {
                product.name = item.name.clone();
                product.description = item.description.clone();
                product.price_cents = item.rate_cents;
                product.stock_on_hand = item.stock_on_hand;
                product.external_item_id = item.item_id.clone();
                product.active = item.active;
                UpsertOutcome::Updated
            }
            None => {
                let product = Product {
                    id: Uuid::new_v4(),
                    org_id,
                    sku: key,
                    name: item.name.clone(),
                    description: item.description.clone(),
                    price_cents: item.rate_cents,
                    currency: currency.to_owned(),
                    stock_on_hand: item.stock_on_hand,
                    external_item_id: item.item_id.clone(),
                    active: item.active,
                    updated_at: Utc::now(),
                };
                tables.products.insert(product.id, product);
                UpsertOutcome::Created
            }
        }
    }

    fn check_poison(&self, item: &ErpItem) -> DomainResult<()> {
        if self.poisoned_keys.lock().contains(item.natural_key()) {
            return Err(CommerceError::Database(format!("write failed for {}", item.natural_key())));
        }
        Ok(())
    }
}

#[async_trait]
impl QuotationRepository for MemoryStore {
    async fn insert(&self, quotation: &Quotation) -> DomainResult<()> {
        let mut tables = self.tables.lock();
        if tables.quotations.values().any(|q| q.number == quotation.number) {
            return Err(CommerceError::Conflict(format!("number {}", quotation.number)));
        }
        tables.quotations.insert(quotation.id, quotation.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> DomainResult<Option<Quotation>> {
        Ok(self.tables.lock().quotations.get(&id).cloned())
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: &[QuotationStatus],
        next: QuotationStatus,
        _note: Option<&str>,
    ) -> DomainResult<bool> {
        let mut tables = self.tables.lock();
        match tables.quotations.get_mut(&id) {
            Some(q) if expected.contains(&q.status) => {
                q.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_external_estimate_id(&self, id: Uuid, estimate_id: &str) -> DomainResult<()> {
        if let Some(q) = self.tables.lock().quotations.get_mut(&id) {
            q.external_estimate_id = Some(estimate_id.to_owned());
        }
        Ok(())
    }

    async fn find_expirable(&self, now: DateTime<Utc>) -> DomainResult<Vec<Quotation>> {
        Ok(self
            .tables
            .lock()
            .quotations
            .values()
            .filter(|q| QuotationStatus::EXPIRABLE.contains(&q.status) && q.is_expired_at(now))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_for_quotation(&self, order: &Order, convert_quotation: bool) -> DomainResult<()> {
        let mut tables = self.tables.lock();
        if let Some(quotation_id) = order.quotation_id {
            if tables.orders.values().any(|o| o.quotation_id == Some(quotation_id)) {
                return Err(CommerceError::Conflict(format!("order exists for {quotation_id}")));
            }
            if convert_quotation {
                let quotation = tables
                    .quotations
                    .get_mut(&quotation_id)
                    .ok_or_else(|| CommerceError::NotFound(format!("quotation {quotation_id}")))?;
                if !QuotationStatus::CONVERTIBLE.contains(&quotation.status) {
                    return Err(CommerceError::Conflict(format!(
                        "quotation {quotation_id} is {}",
                        quotation.status
                    )));
                }
                quotation.status = QuotationStatus::Converted;
            }
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> DomainResult<Option<Order>> {
        Ok(self.tables.lock().orders.get(&id).cloned())
    }

    async fn find_by_tran_ref(&self, tran_ref: &str) -> DomainResult<Option<Order>> {
        Ok(self
            .tables
            .lock()
            .orders
            .values()
            .find(|o| o.gateway_tran_ref.as_deref() == Some(tran_ref))
            .cloned())
    }

    async fn find_by_quotation(&self, quotation_id: Uuid) -> DomainResult<Option<Order>> {
        Ok(self
            .tables
            .lock()
            .orders
            .values()
            .find(|o| o.quotation_id == Some(quotation_id))
            .cloned())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        next: OrderStatus,
        payment_id: Option<&str>,
    ) -> DomainResult<bool> {
        let mut tables = self.tables.lock();
        match tables.orders.get_mut(&id) {
            Some(order) if expected.contains(&order.status) => {
                order.status = next;
                if let Some(payment_id) = payment_id {
                    order.gateway_payment_id = Some(payment_id.to_owned());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn assign_tran_ref(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        tran_ref: &str,
    ) -> DomainResult<bool> {
        let mut tables = self.tables.lock();
        match tables.orders.get_mut(&id) {
            Some(order) if expected.contains(&order.status) => {
                order.status = OrderStatus::AwaitingPayment;
                order.gateway_tran_ref = Some(tran_ref.to_owned());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_external_sales_order_id(&self, id: Uuid, sales_order_id: &str) -> DomainResult<()> {
        if let Some(order) = self.tables.lock().orders.get_mut(&id) {
            order.external_sales_order_id = Some(sales_order_id.to_owned());
        }
        Ok(())
    }

    async fn set_external_invoice_id(&self, id: Uuid, invoice_id: &str) -> DomainResult<()> {
        if let Some(order) = self.tables.lock().orders.get_mut(&id) {
            order.external_invoice_id = Some(invoice_id.to_owned());
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookEventRepository for MemoryStore {
    async fn append(&self, event: &WebhookEvent) -> DomainResult<()> {
        self.tables.lock().events.push(event.clone());
        Ok(())
    }

    async fn find_by_order(&self, order_id: Uuid) -> DomainResult<Vec<WebhookEvent>> {
        Ok(self
            .tables
            .lock()
            .events
            .iter()
            .filter(|e| e.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    async fn list_failed(&self, limit: usize) -> DomainResult<Vec<WebhookEvent>> {
        Ok(self
            .tables
            .lock()
            .events
            .iter()
            .rev()
            .filter(|e| e.status == WebhookEventStatus::Failed)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn upsert_product(
        &self,
        org_id: Uuid,
        item: &ErpItem,
        currency: &str,
    ) -> DomainResult<UpsertOutcome> {
        self.check_poison(item)?;
        let mut tables = self.tables.lock();
        Ok(Self::upsert_locked(&mut tables, org_id, item, currency))
    }

    async fn upsert_products_atomically(
        &self,
        org_id: Uuid,
        items: &[ErpItem],
        currency: &str,
    ) -> DomainResult<Vec<UpsertOutcome>> {
        for item in items {
            self.check_poison(item)?;
        }
        let mut tables = self.tables.lock();
        Ok(items.iter().map(|item| Self::upsert_locked(&mut tables, org_id, item, currency)).collect())
    }

    async fn find_product(&self, id: Uuid) -> DomainResult<Option<Product>> {
        Ok(self.tables.lock().products.get(&id).cloned())
    }

    async fn find_by_external_id(&self, org_id: Uuid, item_id: &str) -> DomainResult<Option<Product>> {
        Ok(self
            .tables
            .lock()
            .products
            .values()
            .find(|p| p.org_id == org_id && p.external_item_id == item_id)
            .cloned())
    }

    async fn deactivate_by_external_id(&self, org_id: Uuid, item_id: &str) -> DomainResult<bool> {
        let mut tables = self.tables.lock();
        match tables
            .products
            .values_mut()
            .find(|p| p.org_id == org_id && p.external_item_id == item_id)
        {
            Some(product) => {
                product.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PartyRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> DomainResult<Option<Party>> {
        Ok(self.tables.lock().parties.get(&id).cloned())
    }

    async fn link_external_contact(&self, id: Uuid, contact_id: &str) -> DomainResult<()> {
        if let Some(party) = self.tables.lock().parties.get_mut(&id) {
            party.external_contact_id = Some(contact_id.to_owned());
        }
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn insert(&self, invoice: &Invoice) -> DomainResult<()> {
        self.tables.lock().invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn find_by_order(&self, order_id: Uuid) -> DomainResult<Option<Invoice>> {
        Ok(self.tables.lock().invoices.values().find(|i| i.order_id == order_id).cloned())
    }

    async fn update_status_by_external_id(
        &self,
        org_id: Uuid,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> DomainResult<bool> {
        let mut tables = self.tables.lock();
        match tables
            .invoices
            .values_mut()
            .find(|i| i.org_id == org_id && i.external_invoice_id.as_deref() == Some(invoice_id))
        {
            Some(invoice) => {
                invoice.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ConnectionRepository for MemoryStore {
    async fn find(&self, org_id: Uuid) -> DomainResult<Option<ExternalConnection>> {
        Ok(self.tables.lock().connections.get(&org_id).cloned())
    }

    async fn find_by_tenant(&self, tenant_id: &str) -> DomainResult<Option<ExternalConnection>> {
        Ok(self
            .tables
            .lock()
            .connections
            .values()
            .find(|c| c.tenant_id.as_deref() == Some(tenant_id))
            .cloned())
    }

    async fn upsert(&self, connection: &ExternalConnection) -> DomainResult<()> {
        self.tables.lock().connections.insert(connection.org_id, connection.clone());
        Ok(())
    }

    async fn replace_if_unchanged(
        &self,
        connection: &ExternalConnection,
        previous_expires_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut tables = self.tables.lock();
        match tables.connections.get_mut(&connection.org_id) {
            Some(stored) if stored.expires_at == previous_expires_at => {
                *stored = connection.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
