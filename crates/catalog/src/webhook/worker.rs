//! Background sync worker.
//!
//! A single task that wakes on a fixed cadence and, in order:
//!
//! 1. On startup, fails any sync record left in `processing` by a
//!    previous process.
//! 2. Processes the pending webhook job, if one is on disk: run the job
//!    pipeline (download the feed, full sync with edge computation
//!    deferred), persist the terminal sync state, and only then delete
//!    the job file. A crash between persistence and deletion retries the
//!    job safely.
//! 3. Back-fills compatibilities for a small batch of products that have
//!    no outgoing edges yet.
//!
//! Shutdown is observed between iterations; an in-flight download is
//! bounded by its own timeout rather than interrupted.

use crate::{
    error::Result,
    product::CatalogStore,
    sync::{SyncOutcome, SyncService},
    webhook::{FeedDownloader, JobQueue, WebhookJob},
};
use async_trait::async_trait;
use compat_core::config::{DataConfig, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const INTERRUPTED_MESSAGE: &str =
    "Feed processing interrupted by service restart; the queued job will be retried.";

/// Executes one queued feed job end to end.
#[async_trait]
pub trait JobPipeline: Send + Sync {
    async fn execute(&self, job: &WebhookJob) -> Result<SyncOutcome>;
}

/// Production pipeline: download the workbook to the canonical feed path,
/// then run the full sync. Edge computation is deferred to the back-fill
/// pass so the webhook turnaround stays fast.
pub struct FeedSyncPipeline {
    sync: Arc<SyncService>,
    downloader: FeedDownloader,
    data_config: DataConfig,
}

impl FeedSyncPipeline {
    pub fn new(sync: Arc<SyncService>, downloader: FeedDownloader, data_config: DataConfig) -> Self {
        Self {
            sync,
            downloader,
            data_config,
        }
    }
}

#[async_trait]
impl JobPipeline for FeedSyncPipeline {
    async fn execute(&self, job: &WebhookJob) -> Result<SyncOutcome> {
        let feed_path = self.data_config.feed_path();
        self.downloader
            .download_to(&job.source_url, &feed_path)
            .await?;
        self.sync.full_sync(&feed_path, false).await
    }
}

pub struct SyncWorker {
    store: Arc<dyn CatalogStore>,
    sync: Arc<SyncService>,
    queue: JobQueue,
    pipeline: Arc<dyn JobPipeline>,
    worker_config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
}

impl SyncWorker {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        sync: Arc<SyncService>,
        queue: JobQueue,
        pipeline: Arc<dyn JobPipeline>,
        worker_config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            sync,
            queue,
            pipeline,
            worker_config,
            shutdown,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!(
            "Sync worker starting (interval {}s, back-fill batch {})",
            self.worker_config.check_interval_secs, self.worker_config.backfill_batch_size
        );

        if let Err(e) = self.store.fail_interrupted(INTERRUPTED_MESSAGE).await {
            error!("Startup cleanup failed: {}", e);
        }

        if self.sleep(self.worker_config.startup_delay_secs).await {
            return;
        }

        loop {
            if let Err(e) = self.process_pending_job().await {
                error!("Webhook job processing error: {}", e);
            }
            if let Err(e) = self.backfill().await {
                error!("Back-fill error: {}", e);
            }
            if self.sleep(self.worker_config.check_interval_secs).await {
                break;
            }
        }

        info!("Sync worker stopped");
    }

    /// Sleep for `secs`, returning true when shutdown was signalled.
    async fn sleep(&mut self, secs: u64) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => false,
            _ = self.shutdown.changed() => {
                info!("Sync worker received shutdown signal");
                true
            }
        }
    }

    async fn process_pending_job(&self) -> Result<()> {
        let Some(job) = self.queue.peek().await? else {
            return Ok(());
        };
        info!(
            "Processing queued webhook #{} from {}",
            job.sync_id, job.source_url
        );

        if self.store.get_sync(job.sync_id).await?.is_none() {
            warn!("Sync record #{} not found; dropping job", job.sync_id);
            self.queue.remove().await?;
            return Ok(());
        }

        self.store.set_sync_processing(job.sync_id).await?;

        match self.pipeline.execute(&job).await {
            Ok(outcome) => {
                let counts = outcome.report.counts();
                let metadata = outcome.report.to_metadata();
                // Terminal state lands before the job file goes away; a
                // crash in between just replays an already-applied sync.
                self.store
                    .complete_sync(job.sync_id, counts, metadata)
                    .await?;
                self.queue.remove().await?;
                info!(
                    "Webhook #{} completed: {} added, {} updated, {} deleted",
                    job.sync_id, counts.added, counts.updated, counts.deleted
                );
            }
            Err(e) => {
                error!("Webhook #{} failed: {}", job.sync_id, e);
                // Same discipline for failures: if recording the failure
                // itself errors, the job file stays for a retry.
                self.store.fail_sync(job.sync_id, &e.to_string()).await?;
                self.queue.remove().await?;
            }
        }
        Ok(())
    }

    async fn backfill(&self) -> Result<()> {
        let processed = self
            .sync
            .backfill_missing_edges(self.worker_config.backfill_batch_size)
            .await?;
        if processed > 0 {
            info!("Back-filled compatibilities for {} products", processed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SnapshotHolder;
    use crate::product::SyncState;
    use crate::query::QueryCache;
    use crate::sync::differ::DiffReport;
    use crate::testing::MemoryCatalogStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubPipeline {
        executions: AtomicUsize,
    }

    impl StubPipeline {
        fn new() -> Self {
            Self {
                executions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobPipeline for StubPipeline {
        async fn execute(&self, _job: &WebhookJob) -> Result<SyncOutcome> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(SyncOutcome {
                report: DiffReport::default(),
                compatibilities_updated: 0,
            })
        }
    }

    fn scratch_queue(name: &str) -> JobQueue {
        JobQueue::new(
            std::env::temp_dir()
                .join(format!("compat-worker-{}-{}", name, std::process::id()))
                .join("webhook_queue.json"),
        )
    }

    fn worker_with(
        store: Arc<MemoryCatalogStore>,
        queue: JobQueue,
        pipeline: Arc<StubPipeline>,
    ) -> SyncWorker {
        let sync = Arc::new(SyncService::new(
            store.clone(),
            Arc::new(SnapshotHolder::empty()),
            Arc::new(QueryCache::new()),
        ));
        let (_tx, rx) = watch::channel(false);
        // The sender is dropped here; the worker only observes the
        // receiver inside `sleep`, which these tests never reach.
        SyncWorker::new(store, sync, queue, pipeline, WorkerConfig::default(), rx)
    }

    #[tokio::test]
    async fn startup_cleanup_fails_interrupted_syncs() {
        // A record stuck in `processing` from a crashed
        // run is failed at startup while the job file stays pending.
        let store = MemoryCatalogStore::new();
        let record = store.create_sync("webhook", None).await.unwrap();
        store.set_sync_processing(record.id).await.unwrap();

        let failed = store.fail_interrupted(INTERRUPTED_MESSAGE).await.unwrap();
        assert_eq!(failed, 1);

        let after = store.get_sync(record.id).await.unwrap().unwrap();
        assert_eq!(after.status, SyncState::Failed.as_str());
        assert!(after.error_message.unwrap().contains("interrupted"));
    }

    #[tokio::test]
    async fn queued_records_are_untouched_by_cleanup() {
        let store = MemoryCatalogStore::new();
        let record = store.create_sync("webhook", None).await.unwrap();

        let failed = store.fail_interrupted(INTERRUPTED_MESSAGE).await.unwrap();
        assert_eq!(failed, 0);
        let after = store.get_sync(record.id).await.unwrap().unwrap();
        assert_eq!(after.status, SyncState::Queued.as_str());
    }

    #[tokio::test]
    async fn interrupted_job_is_reprocessed_to_completion_after_restart() {
        // The full restart story: a process dies after the job file is
        // written but before the sync finishes. On restart the stale
        // `processing` record is failed, the job file is still present,
        // and the next worker pass picks it back up and completes it.
        let store = Arc::new(MemoryCatalogStore::new());
        let url = "https://feeds.example.com/export.xlsx";

        let record = store.create_sync("webhook", Some(url)).await.unwrap();
        let queue = scratch_queue("restart");
        queue.enqueue(&WebhookJob::new(record.id, url)).await.unwrap();
        store.set_sync_processing(record.id).await.unwrap();
        // Process dies here.

        // Restart: startup cleanup runs, the job file survives.
        let failed = store.fail_interrupted(INTERRUPTED_MESSAGE).await.unwrap();
        assert_eq!(failed, 1);
        assert!(queue.is_pending());

        let pipeline = Arc::new(StubPipeline::new());
        let worker = worker_with(store.clone(), scratch_queue("restart"), pipeline.clone());
        worker.process_pending_job().await.unwrap();

        assert_eq!(pipeline.executions.load(Ordering::SeqCst), 1);
        let after = store.get_sync(record.id).await.unwrap().unwrap();
        assert_eq!(after.status, SyncState::Completed.as_str());
        assert!(after.completed_at.is_some());
        assert!(!queue.is_pending());
    }

    #[tokio::test]
    async fn job_without_a_sync_record_is_dropped() {
        let store = Arc::new(MemoryCatalogStore::new());
        let record = store.create_sync("webhook", None).await.unwrap();
        let queue = scratch_queue("orphan");
        // Point the job at a record that does not exist; the worker drops
        // it without touching real records.
        queue
            .enqueue(&WebhookJob::new(record.id + 100, "https://feeds.example.com/x.xlsx"))
            .await
            .unwrap();

        let pipeline = Arc::new(StubPipeline::new());
        let worker = worker_with(store.clone(), scratch_queue("orphan"), pipeline.clone());
        worker.process_pending_job().await.unwrap();

        assert_eq!(pipeline.executions.load(Ordering::SeqCst), 0);
        assert!(!queue.is_pending());
        let untouched = store.get_sync(record.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, SyncState::Queued.as_str());
    }
}
