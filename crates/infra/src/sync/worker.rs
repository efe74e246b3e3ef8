//! Supervised worker that runs ERP sync jobs off the request path.
//!
//! Jobs arrive through a bounded queue ([`SyncQueue`]). The worker owns a
//! single supervising task that keeps at most `max_concurrent` jobs in
//! flight, wraps every job in a timeout and reports failures on a channel.
//! Join handles are tracked and cancellation is explicit.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orderbridge_core::SyncJobHandler;
//! use orderbridge_infra::sync::{SyncWorker, SyncWorkerConfig};
//!
//! # async fn example(handler: Arc<dyn SyncJobHandler>) -> orderbridge_domain::Result<()> {
//! let (mut worker, queue, mut failures) = SyncWorker::new(handler, SyncWorkerConfig::default());
//! worker.start()?;
//! // hand `queue` to the services as their `SyncJobSink`
//! # drop(queue);
//! tokio::spawn(async move {
//!     while let Some(failure) = failures.recv().await {
//!         tracing::error!(correlation_id = %failure.correlation_id, "sync failed");
//!     }
//! });
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orderbridge_core::sync::ports::{SyncJobHandler, SyncJobSink};
use orderbridge_core::{SyncJob, SyncJobKind};
use orderbridge_domain::{CommerceError, Result, SyncConfig};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    pub queue_capacity: usize,
    pub max_concurrent: usize,
    /// Upper bound for a single job
    pub job_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncWorkerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            max_concurrent: config.max_concurrent.max(1),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// A job that failed or timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub correlation_id: Uuid,
    pub kind: SyncJobKind,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct SyncStats {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl SyncStats {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Producer side of the worker queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    sender: mpsc::Sender<SyncJob>,
}

impl SyncJobSink for SyncQueue {
    fn enqueue(&self, job: SyncJob) -> Result<()> {
        let correlation_id = job.correlation_id;
        let kind = job.kind.label();
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!(%correlation_id, kind, "sync job enqueued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                Err(CommerceError::Internal(format!("sync queue full; dropped {kind} job")))
            }
            Err(TrySendError::Closed(_)) => {
                Err(CommerceError::Internal("sync queue closed".into()))
            }
        }
    }
}

pub struct SyncWorker {
    handler: Arc<dyn SyncJobHandler>,
    config: SyncWorkerConfig,
    receiver: Option<mpsc::Receiver<SyncJob>>,
    failures: mpsc::Sender<SyncFailure>,
    stats: Arc<SyncStats>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<mpsc::Receiver<SyncJob>>>,
}

impl SyncWorker {
    /// Build a stopped worker, the queue that feeds it and the channel its
    /// failures are reported on.
    pub fn new(
        handler: Arc<dyn SyncJobHandler>,
        config: SyncWorkerConfig,
    ) -> (Self, SyncQueue, mpsc::Receiver<SyncFailure>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (failure_tx, failure_rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = Self {
            handler,
            config,
            receiver: Some(receiver),
            failures: failure_tx,
            stats: Arc::new(SyncStats::default()),
            cancellation: CancellationToken::new(),
            task_handle: None,
        };
        (worker, SyncQueue { sender }, failure_rx)
    }

    pub fn stats(&self) -> Arc<SyncStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(CommerceError::Internal("sync worker already running".into()));
        }
        let receiver = self.receiver.take().ok_or_else(|| {
            CommerceError::Internal("sync worker queue was lost by an earlier stop".into())
        })?;

        self.cancellation = CancellationToken::new();
        let supervisor = Supervisor {
            handler: Arc::clone(&self.handler),
            failures: self.failures.clone(),
            stats: Arc::clone(&self.stats),
            max_concurrent: self.config.max_concurrent.max(1),
            job_timeout: self.config.job_timeout,
        };
        let cancel = self.cancellation.clone();
        self.task_handle = Some(tokio::spawn(supervisor.run(receiver, cancel)));

        info!(
            max_concurrent = self.config.max_concurrent,
            queue_capacity = self.config.queue_capacity,
            "sync worker started"
        );
        Ok(())
    }

    /// Stop accepting work, let in-flight jobs finish and wait for the
    /// supervising task up to the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(CommerceError::Internal("sync worker not running".into()));
        };

        self.cancellation.cancel();
        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(receiver)) => {
                self.receiver = Some(receiver);
                info!(
                    processed = self.stats.processed(),
                    failed = self.stats.failed(),
                    "sync worker stopped"
                );
                Ok(())
            }
            Ok(Err(err)) => {
                error!(error = %err, "sync worker task panicked");
                Err(CommerceError::Internal("sync worker task panicked".into()))
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.join_timeout.as_secs(),
                    "sync worker did not stop within timeout"
                );
                Err(CommerceError::Internal("sync worker stop timed out".into()))
            }
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

struct Supervisor {
    handler: Arc<dyn SyncJobHandler>,
    failures: mpsc::Sender<SyncFailure>,
    stats: Arc<SyncStats>,
    max_concurrent: usize,
    job_timeout: Duration,
}

impl Supervisor {
    async fn run(
        self,
        mut receiver: mpsc::Receiver<SyncJob>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<SyncJob> {
        let this = Arc::new(self);
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("sync worker loop cancelled");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "sync job task panicked");
                    }
                }
                job = receiver.recv(), if in_flight.len() < this.max_concurrent => {
                    let Some(job) = job else {
                        debug!("sync queue closed; worker exiting");
                        break;
                    };
                    let this = Arc::clone(&this);
                    in_flight.spawn(async move { this.run_job(job).await });
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "sync job task panicked");
            }
        }
        receiver
    }

    async fn run_job(&self, job: SyncJob) {
        let started = Instant::now();
        let correlation_id = job.correlation_id;
        let kind = job.kind.label();

        let error = match tokio::time::timeout(self.job_timeout, self.handler.handle(&job)).await {
            Ok(Ok(())) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                info!(
                    %correlation_id,
                    kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sync job completed"
                );
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {}s", self.job_timeout.as_secs()),
        };

        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        warn!(%correlation_id, kind, error = %error, "sync job failed");
        let failure = SyncFailure { correlation_id, kind: job.kind, error };
        if self.failures.try_send(failure).is_err() {
            warn!(%correlation_id, "sync failure channel full or closed; failure only logged");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<Uuid>>,
        fail: bool,
        delay: Option<Duration>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SyncJobHandler for RecordingHandler {
        async fn handle(&self, job: &SyncJob) -> Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.seen.lock().push(job.correlation_id);
            if self.fail {
                return Err(CommerceError::external_api("ERP unavailable", Some(503)));
            }
            Ok(())
        }
    }

    fn config() -> SyncWorkerConfig {
        SyncWorkerConfig {
            queue_capacity: 16,
            max_concurrent: 2,
            job_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }

    fn job() -> SyncJob {
        SyncJob::order_documents(Uuid::now_v7(), Utc::now())
    }

    #[tokio::test]
    async fn processes_enqueued_jobs_and_counts_them() {
        let handler = Arc::new(RecordingHandler::default());
        let (mut worker, queue, _failures) = SyncWorker::new(handler.clone(), config());
        worker.start().expect("start");

        let jobs: Vec<SyncJob> = (0..3).map(|_| job()).collect();
        for job in &jobs {
            queue.enqueue(job.clone()).expect("enqueue");
        }
        drop(queue);
        tokio::time::timeout(Duration::from_secs(5), async {
            while worker.stats().processed() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("jobs processed");
        worker.stop().await.expect("stop");

        let mut seen = handler.seen.lock().clone();
        let mut expected: Vec<Uuid> = jobs.iter().map(|j| j.correlation_id).collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
        assert_eq!(worker.stats().failed(), 0);
    }

    #[tokio::test]
    async fn failures_are_reported_with_correlation_id() {
        let handler = Arc::new(RecordingHandler { fail: true, ..RecordingHandler::default() });
        let (mut worker, queue, mut failures) = SyncWorker::new(handler, config());
        worker.start().expect("start");

        let job = job();
        queue.enqueue(job.clone()).expect("enqueue");
        let failure = tokio::time::timeout(Duration::from_secs(5), failures.recv())
            .await
            .expect("failure reported")
            .expect("channel open");
        assert_eq!(failure.correlation_id, job.correlation_id);
        assert_eq!(failure.kind, job.kind);
        assert!(failure.error.contains("ERP unavailable"));

        worker.stop().await.expect("stop");
        assert_eq!(worker.stats().failed(), 1);
    }

    #[tokio::test]
    async fn slow_jobs_time_out() {
        let handler = Arc::new(RecordingHandler {
            delay: Some(Duration::from_secs(30)),
            ..RecordingHandler::default()
        });
        let cfg = SyncWorkerConfig { job_timeout: Duration::from_millis(20), ..config() };
        let (mut worker, queue, mut failures) = SyncWorker::new(handler, cfg);
        worker.start().expect("start");

        queue.enqueue(job()).expect("enqueue");
        let failure = tokio::time::timeout(Duration::from_secs(5), failures.recv())
            .await
            .expect("failure reported")
            .expect("channel open");
        assert!(failure.error.contains("timed out"));
        worker.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn in_flight_jobs_never_exceed_limit() {
        let handler = Arc::new(RecordingHandler {
            delay: Some(Duration::from_millis(20)),
            ..RecordingHandler::default()
        });
        let (mut worker, queue, _failures) = SyncWorker::new(handler.clone(), config());
        worker.start().expect("start");

        for _ in 0..8 {
            queue.enqueue(job()).expect("enqueue");
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            while worker.stats().processed() < 8 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("jobs processed");
        worker.stop().await.expect("stop");

        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let handler = Arc::new(RecordingHandler::default());
        let cfg = SyncWorkerConfig { queue_capacity: 1, ..config() };
        let (_worker, queue, _failures) = SyncWorker::new(handler, cfg);

        queue.enqueue(job()).expect("first fits");
        let err = queue.enqueue(job()).expect_err("second overflows");
        assert!(err.to_string().contains("full"));
    }

    #[tokio::test]
    async fn lifecycle_guards_and_restart() {
        let handler = Arc::new(RecordingHandler::default());
        let (mut worker, queue, _failures) = SyncWorker::new(handler, config());

        assert!(worker.stop().await.is_err());
        worker.start().expect("start");
        assert!(worker.start().is_err());
        worker.stop().await.expect("stop");
        assert!(!worker.is_running());

        worker.start().expect("restart");
        queue.enqueue(job()).expect("enqueue after restart");
        worker.stop().await.expect("stop again");
    }
}
