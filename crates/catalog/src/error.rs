use thiserror::Error;

/// Catalog and pipeline errors.
///
/// The rule engine itself never raises: a mismatch is an empty result and a
/// missing optional sheet is a skipped category. Everything that can fail
/// lands in one of these kinds.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Malformed caller input (webhook payload, lookup request).
    /// Surfaced to the caller, never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unreadable workbook, missing critical sheet or column.
    #[error("Invalid feed: {0}")]
    InvalidFeed(String),

    /// Transient storage failure that exhausted its local retries.
    #[error("Transient storage error: {0}")]
    TransientStorage(String),

    /// Unrecoverable mid-sync failure. Batches committed before the abort
    /// remain and are reconciled by the next successful sync.
    #[error("Sync aborted: {0}")]
    SyncAborted(String),

    /// Unique-constraint race on an edge insert. Treated as idempotent
    /// success by the materializer.
    #[error("Duplicate edge {base_sku} -> {partner_sku}")]
    DuplicateEdge { base_sku: String, partner_sku: String },

    /// A sync left in `processing` by a previous process, discovered at
    /// startup. Recorded on the sync record only.
    #[error("Run interrupted: {0}")]
    InterruptedRun(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Core error: {0}")]
    Core(#[from] compat_core::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
