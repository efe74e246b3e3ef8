//! # orderbridge core
//!
//! Lifecycle orchestration with no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (repositories, ERP API, payment gateway, sync queue)
//! - The generic batch processor
//! - Quotation/order lifecycle, payment orchestration and ERP sync services
//!
//! ## Architecture Principles
//! - Only depends on `orderbridge-domain` and `orderbridge-common`
//! - No database, HTTP, or runtime code
//! - All collaborators injected as `Arc<dyn Port>`
//! - Cross-request consistency comes from conditional writes in the store;
//!   in-process keyed locks only serialize work that has no store guard,
//!   such as pushing one order's ERP documents

pub mod batch;
pub mod erp;
pub mod keyed_locks;
pub mod lifecycle;
pub mod payments;
pub mod sync;

pub use batch::{BatchConfig, BatchObserver, BatchOutcome, BatchProcessor, FailedItem, TransactionScope};
pub use erp::ports::{
    CatalogRepository, ConnectionRepository, ErpApi, EstimateConverter, InvoiceRepository,
    PartyRepository,
};
pub use erp::{
    CatalogItemFailure, CatalogSyncOptions, CatalogSyncReport, DocumentSyncReport,
    ErpEventDispatcher, ErpEventOutcome, ErpSyncEngine, StepStatus,
};
pub use keyed_locks::KeyedLocks;
pub use lifecycle::ports::{OrderRepository, QuotationRepository};
pub use lifecycle::QuotationLifecycle;
pub use payments::ports::{PaymentGateway, WebhookEventRepository};
pub use payments::{CallbackDisposition, CallbackOutcome, PaymentOrchestrator, QuotationPayment};
pub use sync::ports::{SyncJobHandler, SyncJobSink};
pub use sync::{SyncJob, SyncJobKind};
