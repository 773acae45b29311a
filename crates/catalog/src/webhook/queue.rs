//! On-disk webhook job queue.
//!
//! The queue is a single JSON file: presence means a pending job. Writes
//! go through a temp file and an atomic rename, so the file is always
//! either absent or complete, and it survives process restarts without a
//! broker. A new webhook while a job is pending overwrites it: every job
//! is a full-catalog snapshot, so the latest feed wins.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info};

/// Marker of one pending feed ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookJob {
    pub sync_id: i64,
    pub source_url: String,
    pub enqueued_at: DateTime<Utc>,
}

impl WebhookJob {
    pub fn new(sync_id: i64, source_url: impl Into<String>) -> Self {
        Self {
            sync_id,
            source_url: source_url.into(),
            enqueued_at: Utc::now(),
        }
    }
}

pub struct JobQueue {
    path: PathBuf,
}

impl JobQueue {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Persist a job, replacing any pending one.
    pub async fn enqueue(&self, job: &WebhookJob) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(job)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        info!("Queued webhook job #{} ({})", job.sync_id, job.source_url);
        Ok(())
    }

    /// Read the pending job, if any. A corrupt file is removed and
    /// reported as no job.
    pub async fn peek(&self) -> Result<Option<WebhookJob>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<WebhookJob>(&bytes) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                error!("Invalid queue file {}: {}; removing", self.path.display(), e);
                self.remove().await?;
                Ok(None)
            }
        }
    }

    /// Delete the pending job file. Callers invoke this only after the
    /// sync record's terminal state is durably committed.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn scratch_queue() -> JobQueue {
        let dir = std::env::temp_dir().join(format!(
            "compat-queue-test-{}-{}",
            std::process::id(),
            DIR_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        JobQueue::new(dir.join("webhook_queue.json"))
    }

    #[tokio::test]
    async fn enqueue_peek_remove_round_trip() {
        let queue = scratch_queue();
        assert!(!queue.is_pending());
        assert_eq!(queue.peek().await.unwrap(), None);

        let job = WebhookJob::new(7, "https://feeds.example.com/export.xlsx");
        queue.enqueue(&job).await.unwrap();
        assert!(queue.is_pending());
        assert_eq!(queue.peek().await.unwrap(), Some(job));

        queue.remove().await.unwrap();
        assert!(!queue.is_pending());
    }

    #[tokio::test]
    async fn newer_job_overwrites_pending_one() {
        let queue = scratch_queue();
        queue
            .enqueue(&WebhookJob::new(1, "https://feeds.example.com/old.xlsx"))
            .await
            .unwrap();
        queue
            .enqueue(&WebhookJob::new(2, "https://feeds.example.com/new.xlsx"))
            .await
            .unwrap();

        let pending = queue.peek().await.unwrap().unwrap();
        assert_eq!(pending.sync_id, 2);
    }

    #[tokio::test]
    async fn corrupt_queue_file_is_discarded() {
        let queue = scratch_queue();
        queue
            .enqueue(&WebhookJob::new(1, "https://feeds.example.com/a.xlsx"))
            .await
            .unwrap();
        tokio::fs::write(
            queue.path.clone(),
            b"{ not json",
        )
        .await
        .unwrap();

        assert_eq!(queue.peek().await.unwrap(), None);
        assert!(!queue.is_pending());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = scratch_queue();
        queue.remove().await.unwrap();
        queue.remove().await.unwrap();
    }
}
