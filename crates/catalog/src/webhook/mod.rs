//! Webhook ingestion: the crash-safe on-disk job queue, the bounded feed
//! downloader, and the background worker that drains them.

pub mod download;
pub mod queue;
pub mod worker;

pub use download::FeedDownloader;
pub use queue::{JobQueue, WebhookJob};
pub use worker::{FeedSyncPipeline, JobPipeline, SyncWorker};
