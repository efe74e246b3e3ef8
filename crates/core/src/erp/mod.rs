//! ERP synchronisation: catalog pull, document push and inbound events.

pub mod events;
pub mod ports;
pub mod sync_engine;

pub use events::{ErpEventDispatcher, ErpEventOutcome};
pub use sync_engine::{
    CatalogItemFailure, CatalogSyncOptions, CatalogSyncReport, DocumentSyncReport, ErpSyncEngine,
    StepStatus,
};
