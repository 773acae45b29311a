//! # Database Pool Management
//!
//! Thin wrapper around the PostgreSQL connection pool. The pool is created
//! once at startup and cloned into every component that touches storage;
//! `sqlx::PgPool` handles concurrent access internally.

use crate::{config::DatabaseConfig, error::Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

/// Shared PostgreSQL connection pool.
#[derive(Clone)]
pub struct DatabasePool {
    pub pool: PgPool,
}

impl DatabasePool {
    /// Establishes the connection pool with the configured bounds.
    ///
    /// # Errors
    ///
    /// Returns an error when the database is unreachable, the URL is
    /// malformed or authentication fails.
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!("Initializing database pool");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        info!("Database pool initialized successfully");

        Ok(Self { pool })
    }

    pub fn get(&self) -> &PgPool {
        &self.pool
    }

    pub async fn check_health(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
