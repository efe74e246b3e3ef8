//! Application context - dependency injection container
//!
//! Every adapter is built once here and handed to the services as an
//! `Arc<dyn Port>`. Nothing below this module reaches for a global.

use std::sync::Arc;
use std::time::Duration;

use orderbridge_common::{Clock, SystemClock};
use orderbridge_core::{
    BatchConfig, ErpEventDispatcher, ErpSyncEngine, PaymentOrchestrator, QuotationLifecycle,
    SyncJobHandler, SyncJobSink,
};
use orderbridge_domain::{AppConfig, CommerceError, Result};
use orderbridge_infra::sync::{SyncFailure, SyncStats, SyncWorker, SyncWorkerConfig};
use orderbridge_infra::{
    DbManager, ErpClient, ErpOAuthClient, ErpTokenManager, GatewayClient, GatewaySigner,
    RegionTable, SqliteCatalogRepository, SqliteConnectionRepository, SqliteInvoiceRepository,
    SqliteOrderRepository, SqlitePartyRepository, SqliteQuotationRepository,
    SqliteWebhookEventRepository,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::utils::logging::error_label;

/// How often stale quotations are swept to EXPIRED.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: AppConfig,
    pub db: Arc<DbManager>,
    pub catalog: Arc<SqliteCatalogRepository>,

    // Services
    pub lifecycle: Arc<QuotationLifecycle>,
    pub payments: Arc<PaymentOrchestrator>,
    pub erp_sync: Arc<ErpSyncEngine>,
    pub erp_events: Arc<ErpEventDispatcher>,

    // Integrations
    pub erp_tokens: Arc<ErpTokenManager>,
    pub gateway_signer: GatewaySigner,

    // Background work
    sync_worker: Mutex<SyncWorker>,
    sync_stats: Arc<SyncStats>,
    background: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppContext {
    /// Open the database, wire every adapter and start the sync worker.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;
        info!(path = %config.database.path, "database ready");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let quotations = Arc::new(SqliteQuotationRepository::new(Arc::clone(&db)));
        let orders = Arc::new(SqliteOrderRepository::new(Arc::clone(&db)));
        let catalog = Arc::new(SqliteCatalogRepository::new(Arc::clone(&db)));
        let parties = Arc::new(SqlitePartyRepository::new(Arc::clone(&db)));
        let invoices = Arc::new(SqliteInvoiceRepository::new(Arc::clone(&db)));
        let connections = Arc::new(SqliteConnectionRepository::new(Arc::clone(&db)));
        let events = Arc::new(SqliteWebhookEventRepository::new(Arc::clone(&db)));

        let regions = Arc::new(RegionTable::from_config(&config.erp));
        let oauth = Arc::new(ErpOAuthClient::new(&config.erp, regions)?);
        let erp_tokens = Arc::new(ErpTokenManager::new(
            oauth,
            connections.clone(),
            Arc::clone(&clock),
        ));
        let erp = Arc::new(ErpClient::new(Arc::clone(&erp_tokens), config.erp.timeout_secs)?);

        let gateway = Arc::new(GatewayClient::new(
            &config.gateway,
            &config.payments.public_base_url,
        )?);
        let gateway_signer = gateway.signer().clone();

        let erp_sync = Arc::new(
            ErpSyncEngine::new(
                erp,
                catalog.clone(),
                parties,
                invoices.clone(),
                quotations.clone(),
                orders.clone(),
            )
            .with_batch_config(BatchConfig {
                batch_size: config.sync.batch_size,
                max_concurrent: config.sync.max_concurrent,
            })
            .with_catalog_currency(config.erp.catalog_currency.clone()),
        );

        let handler: Arc<dyn SyncJobHandler> = erp_sync.clone();
        let (mut worker, queue, failures) =
            SyncWorker::new(handler, SyncWorkerConfig::from(&config.sync));
        worker.start()?;
        let sync_stats = worker.stats();
        let sink: Arc<dyn SyncJobSink> = Arc::new(queue);

        let lifecycle = Arc::new(
            QuotationLifecycle::new(
                quotations.clone(),
                orders.clone(),
                Arc::clone(&sink),
                Arc::clone(&clock),
            )
            .with_config(config.quotations.clone())
            .with_estimate_converter(erp_sync.clone()),
        );

        let payments = Arc::new(PaymentOrchestrator::new(
            quotations,
            orders,
            events.clone(),
            gateway,
            sink,
            Arc::clone(&clock),
            config.payments.public_base_url.clone(),
        ));

        let erp_events = Arc::new(
            ErpEventDispatcher::new(catalog.clone(), invoices, connections, events, clock)
                .with_catalog_currency(config.erp.catalog_currency.clone())
                .reject_invalid_signatures(config.gateway.reject_invalid_signatures),
        );

        let background = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(drain_sync_failures(failures, background.clone())),
            tokio::spawn(sweep_expired_quotations(Arc::clone(&lifecycle), background.clone())),
        ];

        if !config.gateway.reject_invalid_signatures {
            warn!("gateway webhook signatures are verified but not enforced");
        }

        Ok(Self {
            config,
            db,
            catalog,
            lifecycle,
            payments,
            erp_sync,
            erp_events,
            erp_tokens,
            gateway_signer,
            sync_worker: Mutex::new(worker),
            sync_stats,
            background,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn sync_stats(&self) -> &SyncStats {
        &self.sync_stats
    }

    pub async fn sync_worker_running(&self) -> bool {
        self.sync_worker.lock().await.is_running()
    }

    /// Stop background tasks and let in-flight sync jobs finish.
    pub async fn shutdown(&self) -> Result<()> {
        self.background.cancel();
        let stopped = self.sync_worker.lock().await.stop().await;

        for task in self.tasks.lock().await.drain(..) {
            if let Err(err) = task.await {
                error!(error = %err, "background task panicked");
            }
        }

        match stopped {
            Ok(()) => Ok(()),
            // already stopped is fine on repeated shutdown
            Err(CommerceError::Internal(msg)) if msg.contains("not running") => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Log every failed sync job with its correlation id.
async fn drain_sync_failures(mut failures: mpsc::Receiver<SyncFailure>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            failure = failures.recv() => {
                let Some(failure) = failure else { break };
                error!(
                    correlation_id = %failure.correlation_id,
                    kind = failure.kind.label(),
                    error = %failure.error,
                    "ERP sync job failed"
                );
            }
        }
    }
}

async fn sweep_expired_quotations(lifecycle: Arc<QuotationLifecycle>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match lifecycle.expire_stale_quotations().await {
                    Ok(0) => {}
                    Ok(expired) => info!(expired, "stale quotations expired"),
                    Err(err) => warn!(error = %err, label = error_label(&err), "quotation expiry sweep failed"),
                }
            }
        }
    }
}
