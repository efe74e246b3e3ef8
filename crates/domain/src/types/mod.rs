//! Commerce entities and the values passed across ports.

pub mod catalog;
pub mod erp;
pub mod integration;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod quotation;

pub use catalog::{Party, PartyKind, Product, UpsertOutcome};
pub use erp::{
    ErpContactDraft, ErpDocumentDraft, ErpDocumentRef, ErpEvent, ErpItem, ErpLineItem,
    ErpOrganization, SignatureCheck,
};
pub use integration::{
    ErpRegion, ExternalConnection, TokenGrant, WebhookEvent, WebhookEventStatus, WebhookSource,
};
pub use invoice::{Invoice, InvoiceStatus};
pub use order::{Order, OrderItem, OrderStatus};
pub use payment::{
    CustomerDetails, NormalizedCallback, PaymentInitiated, PaymentOption, PaymentOutcome,
    PaymentRequest, PaymentSession,
};
pub use quotation::{NewQuotation, NewQuotationItem, Quotation, QuotationItem, QuotationStatus};
