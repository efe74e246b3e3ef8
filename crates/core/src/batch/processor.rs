//! Chunked batch execution with bounded intra-chunk concurrency.
//!
//! Chunks run one after another; items inside a chunk run with at most
//! `max_concurrent` in flight. A failing or panicking item is recorded in
//! [`BatchOutcome::failed`] and never aborts its siblings or later chunks.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use orderbridge_domain::constants::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_CONCURRENT};
use orderbridge_domain::{CommerceError, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Items per chunk.
    pub batch_size: usize,
    /// Items of one chunk allowed in flight at once.
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, max_concurrent: DEFAULT_MAX_CONCURRENT }
    }
}

/// Observability hooks. Implementations cannot influence processing.
pub trait BatchObserver: Send + Sync {
    fn on_progress(&self, _processed: usize, _total: usize, _errors: usize) {}

    fn on_batch_complete(&self, _batch_index: usize, _succeeded: usize, _failed: usize) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem<T> {
    pub item: T,
    pub error: CommerceError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<FailedItem<T>>,
    pub total_processed: usize,
    pub total_errors: usize,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self { succeeded: Vec::new(), failed: Vec::new(), total_processed: 0, total_errors: 0 }
    }
}

impl<T> BatchOutcome<T> {
    pub(crate) fn record_success(&mut self, item: T) {
        self.succeeded.push(item);
        self.total_processed = self.total_processed.saturating_add(1);
    }

    pub(crate) fn record_failure(&mut self, item: T, error: CommerceError) {
        self.failed.push(FailedItem { item, error });
        self.total_processed = self.total_processed.saturating_add(1);
        self.total_errors = self.total_errors.saturating_add(1);
    }
}

#[derive(Clone, Default)]
pub struct BatchProcessor {
    config: BatchConfig,
    observer: Option<Arc<dyn BatchObserver>>,
}

impl BatchProcessor {
    #[must_use]
    pub fn new(config: BatchConfig) -> Self {
        let config = BatchConfig {
            batch_size: config.batch_size.max(1),
            max_concurrent: config.max_concurrent.max(1),
        };
        Self { config, observer: None }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn config(&self) -> BatchConfig {
        self.config
    }

    /// Run `f` over every item, chunk by chunk.
    pub async fn process<T, F, Fut>(&self, items: Vec<T>, f: F) -> BatchOutcome<T>
    where
        T: Clone + Send,
        F: Fn(T) -> Fut + Send + Sync,
        Fut: Future<Output = Result<()>> + Send,
    {
        let total = items.len();
        let mut outcome = BatchOutcome::default();

        for (batch_index, chunk) in chunks(items, self.config.batch_size).into_iter().enumerate() {
            let f = &f;
            let results: Vec<(T, Result<()>)> = stream::iter(chunk.into_iter().map(|item| {
                let call = AssertUnwindSafe(f(item.clone())).catch_unwind();
                async move {
                    let result = call.await.unwrap_or_else(|panic| Err(panic_error(&*panic)));
                    (item, result)
                }
            }))
            .buffered(self.config.max_concurrent)
            .collect()
            .await;

            let mut succeeded = 0_usize;
            let mut failed = 0_usize;
            for (item, result) in results {
                match result {
                    Ok(()) => {
                        succeeded += 1;
                        outcome.record_success(item);
                    }
                    Err(error) => {
                        failed += 1;
                        outcome.record_failure(item, error);
                    }
                }
            }

            debug!(batch_index, succeeded, failed, "batch chunk complete");
            self.notify(batch_index, succeeded, failed, &outcome, total);
        }

        outcome
    }

    pub(crate) fn notify<T>(
        &self,
        batch_index: usize,
        succeeded: usize,
        failed: usize,
        outcome: &BatchOutcome<T>,
        total: usize,
    ) {
        if let Some(observer) = &self.observer {
            observer.on_progress(outcome.total_processed, total, outcome.total_errors);
            observer.on_batch_complete(batch_index, succeeded, failed);
        }
    }
}

pub(crate) fn chunks<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut out = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for item in items {
        current.push(item);
        if current.len() == size {
            out.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn panic_error(panic: &(dyn Any + Send)) -> CommerceError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    CommerceError::Internal(format!("item processing panicked: {message}"))
}
