//! Process-wide catalog snapshot with swap-under-lock publication.

use crate::{canonical_sku, feed::FeedProduct, Category};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Immutable view of the loaded feed, one row list per category sheet.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    sheets: HashMap<Category, Vec<FeedProduct>>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    pub fn new(sheets: HashMap<Category, Vec<FeedProduct>>, loaded_at: DateTime<Utc>) -> Self {
        Self {
            sheets,
            loaded_at: Some(loaded_at),
        }
    }

    /// Rows of one category. `None` when the sheet was absent from the
    /// feed, which matchers treat as a silently skipped category.
    pub fn category(&self, category: Category) -> Option<&[FeedProduct]> {
        self.sheets.get(&category).map(|rows| rows.as_slice())
    }

    /// Locate a product by canonical SKU across all sheets.
    pub fn find(&self, sku: &str) -> Option<&FeedProduct> {
        let canonical = canonical_sku(sku);
        Category::ALL.iter().find_map(|category| {
            self.sheets
                .get(category)?
                .iter()
                .find(|p| p.sku == canonical)
        })
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .iter()
            .copied()
            .filter(|c| self.sheets.contains_key(c))
    }

    pub fn product_count(&self) -> usize {
        self.sheets.values().map(|rows| rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.product_count() == 0
    }
}

/// Holder for the current snapshot.
///
/// Readers clone out an `Arc` and keep a consistent view for as long as
/// they hold it; a swap replaces the pointer without disturbing them.
pub struct SnapshotHolder {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl SnapshotHolder {
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(Arc::new(CatalogSnapshot::default())),
        }
    }

    pub fn with_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Stable handle to the currently published snapshot.
    pub fn current(&self) -> Arc<CatalogSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publish a freshly loaded snapshot. Active readers finish against
    /// the one they already hold.
    pub fn swap(&self, snapshot: CatalogSnapshot) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(snapshot);
    }
}

impl Default for SnapshotHolder {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(products: Vec<FeedProduct>) -> CatalogSnapshot {
        let mut sheets: HashMap<Category, Vec<FeedProduct>> = HashMap::new();
        for p in products {
            sheets.entry(p.category).or_default().push(p);
        }
        CatalogSnapshot::new(sheets, Utc::now())
    }

    #[test]
    fn find_is_case_insensitive() {
        let snapshot = snapshot_with(vec![FeedProduct::new("FB03060M", Category::ShowerBases)]);
        assert!(snapshot.find("fb03060m").is_some());
        assert!(snapshot.find("missing").is_none());
    }

    #[test]
    fn swap_replaces_but_readers_keep_their_handle() {
        let holder = SnapshotHolder::empty();
        let before = holder.current();
        assert!(before.is_empty());

        holder.swap(snapshot_with(vec![FeedProduct::new("A1", Category::Walls)]));

        // The old handle still sees the old view; a fresh read sees the new one.
        assert!(before.is_empty());
        assert_eq!(holder.current().product_count(), 1);
    }
}
