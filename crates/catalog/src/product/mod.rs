//! Product catalog persistence: row models and the storage interface.

pub mod model;
pub mod repository;

pub use model::{
    EdgeRecord, Product, ProductRecord, StoredPartner, SyncCounts, SyncRecord, SyncState,
};
pub use repository::{CatalogStore, PostgresCatalogStore};
