//! Generic chunked executor with per-item error isolation.

pub mod processor;
pub mod transactional;

pub use processor::{BatchConfig, BatchObserver, BatchOutcome, BatchProcessor, FailedItem};
pub use transactional::TransactionScope;
