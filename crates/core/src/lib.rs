pub mod config;
pub mod database;
pub mod error;

pub use config::{Config, DataConfig, DatabaseConfig, ServerConfig, WebhookConfig, WorkerConfig};
pub use database::DatabasePool;
pub use error::{Error, Result};

// Re-export commonly used types from dependencies
pub use chrono::{DateTime, Utc};
