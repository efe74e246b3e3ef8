//! REST client for the ERP's inventory API.
//!
//! Every call resolves a session (fresh token, tenant, regional host) from
//! the organization id and sends the tenant as `organization_id`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderbridge_core::ErpApi;
use orderbridge_domain::constants::{ERP_MAX_PAGES, ERP_PAGE_SIZE};
use orderbridge_domain::{
    CommerceError, ErpContactDraft, ErpDocumentDraft, ErpDocumentRef, ErpItem, ErpLineItem,
    Result,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Number, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::tokens::{ErpSession, ErpTokenManager};
use super::wire::{cents_to_decimal, decimal_to_cents, read_envelope};
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<ItemRecord>,
    page_context: Option<PageContext>,
}

#[derive(Debug, Deserialize)]
struct PageContext {
    has_more_page: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemRecord {
    pub(crate) item_id: String,
    #[serde(default)]
    pub(crate) name: String,
    pub(crate) sku: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) rate: Option<Number>,
    pub(crate) stock_on_hand: Option<Number>,
    pub(crate) status: Option<String>,
}

impl ItemRecord {
    pub(crate) fn into_item(self) -> ErpItem {
        ErpItem {
            rate_cents: self.rate.as_ref().and_then(decimal_to_cents).unwrap_or(0),
            stock_on_hand: self
                .stock_on_hand
                .as_ref()
                .and_then(|n| n.as_i64().or_else(|| decimal_to_cents(n).map(|c| c / 100))),
            active: self.status.as_deref().map_or(true, |s| s.eq_ignore_ascii_case("active")),
            item_id: self.item_id,
            name: self.name,
            sku: self.sku.filter(|s| !s.trim().is_empty()),
            description: self.description.filter(|d| !d.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContactsReply {
    #[serde(default)]
    contacts: Vec<ContactRecord>,
}

#[derive(Debug, Deserialize)]
struct ContactReply {
    contact: ContactRecord,
}

#[derive(Debug, Deserialize)]
struct ContactRecord {
    contact_id: String,
}

/// Estimates, sales orders and invoices carry the same identifying fields
/// prefixed with the document kind (`invoice_id`, `invoice_number`, ...).
fn document_ref(reply: &Value, kind: &str) -> Result<ErpDocumentRef> {
    let document = reply.get(kind).ok_or_else(|| {
        CommerceError::external_api(format!("ERP reply has no {kind} object"), None)
    })?;
    let field = |name: &str| {
        document.get(format!("{kind}_{name}")).and_then(Value::as_str).map(ToOwned::to_owned)
    };
    let id = field("id").ok_or_else(|| {
        CommerceError::external_api(format!("ERP {kind} reply has no {kind}_id"), None)
    })?;
    Ok(ErpDocumentRef {
        id,
        number: field("number"),
        status: document.get("status").and_then(Value::as_str).map(ToOwned::to_owned),
        url: field("url"),
    })
}

pub struct ErpClient {
    http: HttpClient,
    tokens: Arc<ErpTokenManager>,
}

impl ErpClient {
    pub fn new(tokens: Arc<ErpTokenManager>, timeout_secs: u64) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .max_attempts(3)
            .build()?;
        Ok(Self::with_http(tokens, http))
    }

    pub fn with_http(tokens: Arc<ErpTokenManager>, http: HttpClient) -> Self {
        Self { http, tokens }
    }

    fn request(&self, session: &ErpSession, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", session.api_url))
            .bearer_auth(&session.access_token)
            .query(&[("organization_id", session.tenant_id.as_str())])
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        read_envelope(self.http.send(request).await?).await
    }

    /// Document-creating POSTs are sent once. A replay after a timeout could
    /// create a second contact, sales order or invoice in the ERP.
    async fn call_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        read_envelope(self.http.send_once(request).await?).await
    }

    /// POST `body` to `path` and read back the `kind` document.
    async fn create_document(
        &self,
        org_id: Uuid,
        path: &str,
        kind: &str,
        body: Option<Value>,
    ) -> Result<ErpDocumentRef> {
        let session = self.tokens.session(org_id).await?;
        let mut request = self.request(&session, Method::POST, path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let reply: Value = self.call_once(request).await?;
        let document = document_ref(&reply, kind)?;
        debug!(%org_id, path, document_id = %document.id, "ERP document created");
        Ok(document)
    }
}

fn line_items_json(items: &[ErpLineItem]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let mut line = json!({
                "name": item.name,
                "quantity": item.quantity,
                "rate": cents_to_decimal(item.rate_cents),
            });
            if let Some(item_id) = &item.item_id {
                line["item_id"] = json!(item_id);
            }
            line
        })
        .collect()
}

fn document_json(draft: &ErpDocumentDraft) -> Value {
    let mut body = json!({
        "customer_id": draft.contact_id,
        "reference_number": draft.reference_number,
        "currency_code": draft.currency,
        "line_items": line_items_json(&draft.line_items),
    });
    if let Some(notes) = &draft.notes {
        body["notes"] = json!(notes);
    }
    if let Some(sales_order_id) = &draft.sales_order_id {
        body["salesorder_id"] = json!(sales_order_id);
    }
    body
}

#[async_trait]
impl ErpApi for ErpClient {
    async fn list_items(&self, org_id: Uuid) -> Result<Vec<ErpItem>> {
        let session = self.tokens.session(org_id).await?;
        let per_page = ERP_PAGE_SIZE.to_string();
        let mut items = Vec::new();

        for page in 1..=ERP_MAX_PAGES {
            let request = self
                .request(&session, Method::GET, "/items")
                .query(&[("page", page.to_string().as_str()), ("per_page", per_page.as_str())]);
            let reply: ItemsPage = self.call(request).await?;
            let fetched = reply.items.len();
            items.extend(reply.items.into_iter().map(ItemRecord::into_item));

            let has_more = match reply.page_context {
                Some(context) => context.has_more_page,
                None => fetched >= ERP_PAGE_SIZE,
            };
            if !has_more {
                debug!(%org_id, pages = page, items = items.len(), "ERP catalog fetched");
                return Ok(items);
            }
        }

        warn!(%org_id, max_pages = ERP_MAX_PAGES, "ERP catalog hit the page cap; result truncated");
        Ok(items)
    }

    async fn find_contact(&self, org_id: Uuid, contact: &ErpContactDraft) -> Result<Option<String>> {
        let Some(email) = contact.email.as_deref().filter(|e| !e.is_empty()) else {
            return Ok(None);
        };
        let session = self.tokens.session(org_id).await?;
        let request = self.request(&session, Method::GET, "/contacts").query(&[("email", email)]);
        let reply: ContactsReply = self.call(request).await?;
        Ok(reply.contacts.into_iter().next().map(|c| c.contact_id))
    }

    async fn create_contact(&self, org_id: Uuid, contact: &ErpContactDraft) -> Result<String> {
        let session = self.tokens.session(org_id).await?;
        let mut body = json!({
            "contact_name": contact.name,
            "contact_type": "customer",
        });
        if let Some(email) = &contact.email {
            body["email"] = json!(email);
        }
        if let Some(phone) = &contact.phone {
            body["phone"] = json!(phone);
        }
        let request = self.request(&session, Method::POST, "/contacts").json(&body);
        let reply: ContactReply = self.call_once(request).await?;
        Ok(reply.contact.contact_id)
    }

    async fn create_estimate(&self, org_id: Uuid, draft: &ErpDocumentDraft) -> Result<ErpDocumentRef> {
        self.create_document(org_id, "/estimates", "estimate", Some(document_json(draft))).await
    }

    async fn convert_estimate_to_sales_order(
        &self,
        org_id: Uuid,
        estimate_id: &str,
    ) -> Result<ErpDocumentRef> {
        let path = format!("/salesorders/fromestimate/{}", urlencoding::encode(estimate_id));
        self.create_document(org_id, &path, "salesorder", None).await
    }

    async fn create_sales_order(
        &self,
        org_id: Uuid,
        draft: &ErpDocumentDraft,
    ) -> Result<ErpDocumentRef> {
        self.create_document(org_id, "/salesorders", "salesorder", Some(document_json(draft))).await
    }

    async fn create_invoice(&self, org_id: Uuid, draft: &ErpDocumentDraft) -> Result<ErpDocumentRef> {
        self.create_document(org_id, "/invoices", "invoice", Some(document_json(draft))).await
    }
}
