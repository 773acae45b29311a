use compat_catalog::{product::CatalogStore, query::LookupService, webhook::JobQueue};
use compat_core::{Config, DatabasePool};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DatabasePool,
    pub store: Arc<dyn CatalogStore>,
    pub lookup: Arc<LookupService>,
    pub queue: Arc<JobQueue>,
}
