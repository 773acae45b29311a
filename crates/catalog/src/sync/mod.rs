//! Ingestion pipeline: differential product sync, bidirectional edge
//! materialization, and the full-sync entry point shared by the webhook
//! worker and any alternative trigger.

pub mod differ;
pub mod materializer;
pub mod service;

pub use differ::{DiffReport, DifferentialSync};
pub use materializer::GraphMaterializer;
pub use service::{SyncOutcome, SyncService};
