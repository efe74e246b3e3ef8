//! SQLite persistence behind the core ports.

mod catalog_repository;
mod connection_repository;
mod invoice_repository;
pub mod manager;
mod order_repository;
mod party_repository;
mod quotation_repository;
mod sql;
mod webhook_repository;

pub use catalog_repository::SqliteCatalogRepository;
pub use connection_repository::SqliteConnectionRepository;
pub use invoice_repository::SqliteInvoiceRepository;
pub use manager::{DbManager, SqliteConnection};
pub use order_repository::SqliteOrderRepository;
pub use party_repository::SqlitePartyRepository;
pub use quotation_repository::SqliteQuotationRepository;
pub use webhook_repository::SqliteWebhookEventRepository;
