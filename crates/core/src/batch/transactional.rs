//! Transactional variant: each chunk commits as a whole or not at all.

use async_trait::async_trait;
use orderbridge_domain::{CommerceError, Result};
use tracing::warn;

use super::processor::{chunks, BatchOutcome, BatchProcessor};

/// Caller-supplied transaction wrapped around one chunk.
///
/// Items are applied in order inside the transaction. The processor calls
/// exactly one of `commit` or `rollback` for every successful `begin`.
#[async_trait]
pub trait TransactionScope<T: Send + Sync>: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx>;

    async fn apply(&self, tx: &mut Self::Tx, item: &T) -> Result<()>;

    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback(&self, tx: Self::Tx);
}

impl BatchProcessor {
    /// Run every chunk inside its own transaction.
    ///
    /// On any failure the chunk is rolled back and all of its items are
    /// reported failed. When a single item caused it, that item keeps its
    /// own error and its siblings report the rollback. The next chunk is
    /// attempted independently.
    pub async fn process_transactional<T, S>(&self, items: Vec<T>, scope: &S) -> BatchOutcome<T>
    where
        T: Clone + Send + Sync,
        S: TransactionScope<T>,
    {
        let total = items.len();
        let mut outcome = BatchOutcome::default();

        for (batch_index, chunk) in chunks(items, self.config().batch_size).into_iter().enumerate() {
            let size = chunk.len();
            match run_chunk(scope, &chunk).await {
                Ok(()) => {
                    for item in chunk {
                        outcome.record_success(item);
                    }
                    self.notify(batch_index, size, 0, &outcome, total);
                }
                Err((offender, error)) => {
                    warn!(batch_index, error = %error, "batch rolled back");
                    for (index, item) in chunk.into_iter().enumerate() {
                        let item_error = if offender.is_none() || offender == Some(index) {
                            error.clone()
                        } else {
                            CommerceError::Conflict(format!("rolled back with its batch: {error}"))
                        };
                        outcome.record_failure(item, item_error);
                    }
                    self.notify(batch_index, 0, size, &outcome, total);
                }
            }
        }

        outcome
    }
}

/// Returns the index of the failing item (if an item failed) and the error.
async fn run_chunk<T, S>(scope: &S, chunk: &[T]) -> std::result::Result<(), (Option<usize>, CommerceError)>
where
    T: Send + Sync,
    S: TransactionScope<T>,
{
    let mut tx = scope.begin().await.map_err(|err| (None, err))?;

    for (index, item) in chunk.iter().enumerate() {
        if let Err(err) = scope.apply(&mut tx, item).await {
            scope.rollback(tx).await;
            return Err((Some(index), err));
        }
    }

    scope.commit(tx).await.map_err(|err| (None, err))
}
