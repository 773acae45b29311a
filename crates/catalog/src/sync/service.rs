//! Full-sync entry point: feed load, snapshot swap, differential product
//! sync and (optionally deferred) edge materialization.

use crate::{
    error::Result,
    feed::{FeedLoader, SnapshotHolder},
    product::CatalogStore,
    query::QueryCache,
    sync::{differ::DiffReport, DifferentialSync, GraphMaterializer},
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Outcome of one full sync.
#[derive(Debug)]
pub struct SyncOutcome {
    pub report: DiffReport,
    pub compatibilities_updated: u64,
}

/// Shared by the webhook worker and any alternative ingestion trigger;
/// both funnel through [`SyncService::full_sync`].
pub struct SyncService {
    store: Arc<dyn CatalogStore>,
    snapshots: Arc<SnapshotHolder>,
    cache: Arc<QueryCache>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        snapshots: Arc<SnapshotHolder>,
        cache: Arc<QueryCache>,
    ) -> Self {
        Self {
            store,
            snapshots,
            cache,
        }
    }

    /// Load the workbook at `feed_path`, publish the snapshot, reconcile
    /// the store, and optionally materialize edges for the change set.
    ///
    /// Webhook processing passes `compute_compatibilities = false` and
    /// leaves edge work to the back-fill pass; direct invocations may
    /// compute inline.
    pub async fn full_sync(
        &self,
        feed_path: &Path,
        compute_compatibilities: bool,
    ) -> Result<SyncOutcome> {
        info!(
            "Starting full sync from {} (compute_compatibilities={})",
            feed_path.display(),
            compute_compatibilities
        );

        let snapshot = FeedLoader::load_path(feed_path)?;
        self.snapshots.swap(snapshot);
        let snapshot = self.snapshots.current();

        let report = DifferentialSync::new(self.store.as_ref())
            .run(&snapshot)
            .await?;

        let mut compatibilities_updated = 0;
        if compute_compatibilities && !report.is_empty() {
            let changed = report.changed_skus();
            compatibilities_updated =
                GraphMaterializer::new(self.store.as_ref(), &self.snapshots, &self.cache)
                    .materialize(&changed)
                    .await?;
        }

        // Product rows changed even when edge work is deferred; lookups
        // must not serve the previous feed.
        self.cache.clear();

        Ok(SyncOutcome {
            report,
            compatibilities_updated,
        })
    }

    /// Materialize edges for a batch of products that have none yet.
    /// Returns the number of products processed.
    pub async fn backfill_missing_edges(&self, batch_size: i64) -> Result<usize> {
        let skus = self.store.list_skus_missing_edges(batch_size).await?;
        if skus.is_empty() {
            return Ok(0);
        }
        info!("Back-filling compatibilities for {} products", skus.len());

        let changed = skus.iter().cloned().collect();
        GraphMaterializer::new(self.store.as_ref(), &self.snapshots, &self.cache)
            .materialize(&changed)
            .await?;
        Ok(skus.len())
    }
}
