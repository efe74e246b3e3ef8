//! Ports for the background sync queue.

use async_trait::async_trait;
use orderbridge_domain::Result;

use super::SyncJob;

/// Accepts jobs for later execution. Must not block.
pub trait SyncJobSink: Send + Sync {
    fn enqueue(&self, job: SyncJob) -> Result<()>;
}

/// Executes one dequeued job.
#[async_trait]
pub trait SyncJobHandler: Send + Sync {
    async fn handle(&self, job: &SyncJob) -> Result<()>;
}
