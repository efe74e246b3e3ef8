//! Background execution of ERP sync jobs.

mod worker;

pub use worker::{SyncFailure, SyncQueue, SyncStats, SyncWorker, SyncWorkerConfig};
