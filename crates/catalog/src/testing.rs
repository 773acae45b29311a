//! In-memory [`CatalogStore`] used by unit tests across the crate. It
//! mirrors the relational semantics the PostgreSQL implementation relies
//! on: sku-unique upserts preserving `created_at`, cascading edge deletes,
//! pair-unique edge inserts and score-descending partner reads.

use crate::{
    canonical_sku,
    error::{CatalogError, Result},
    feed::{CatalogSnapshot, FeedProduct},
    product::{
        EdgeRecord, Product, ProductRecord, StoredPartner, SyncCounts, SyncRecord, SyncState,
    },
    Category,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Clone)]
struct EdgeRow {
    id: i64,
    base_product_id: i64,
    compatible_product_id: i64,
    compatibility_score: i32,
    match_reason: Option<String>,
    incompatibility_reason: Option<String>,
}

#[derive(Default)]
struct Inner {
    next_product_id: i64,
    next_edge_id: i64,
    next_sync_id: i64,
    products: Vec<Product>,
    edges: Vec<EdgeRow>,
    syncs: Vec<SyncRecord>,
}

pub struct MemoryCatalogStore {
    inner: Mutex<Inner>,
    fail_next: AtomicBool,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Make the next write operation fail with a transient storage error.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(CatalogError::TransientStorage("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().unwrap().edges.len()
    }

    /// All `(base_sku, partner_sku, score)` triples, for invariant checks.
    pub fn edge_pairs(&self) -> Vec<(String, String, i32)> {
        let inner = self.inner.lock().unwrap();
        let by_id: HashMap<i64, String> = inner
            .products
            .iter()
            .map(|p| (p.id, p.sku.clone()))
            .collect();
        inner
            .edges
            .iter()
            .filter_map(|e| {
                Some((
                    by_id.get(&e.base_product_id)?.clone(),
                    by_id.get(&e.compatible_product_id)?.clone(),
                    e.compatibility_score,
                ))
            })
            .collect()
    }

    pub fn match_reason_of(&self, base_sku: &str, partner_sku: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        let by_sku: HashMap<String, i64> = inner
            .products
            .iter()
            .map(|p| (p.sku.clone(), p.id))
            .collect();
        let base = *by_sku.get(&canonical_sku(base_sku))?;
        let partner = *by_sku.get(&canonical_sku(partner_sku))?;
        inner
            .edges
            .iter()
            .find(|e| e.base_product_id == base && e.compatible_product_id == partner)
            .and_then(|e| e.match_reason.clone())
    }
}

#[async_trait]
impl crate::product::CatalogStore for MemoryCatalogStore {
    async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let canonical = canonical_sku(sku);
        Ok(self
            .inner
            .lock()
            .unwrap()
            .products
            .iter()
            .find(|p| p.sku == canonical)
            .cloned())
    }

    async fn list_by_category(&self, category: Category) -> Result<Vec<Product>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .products
            .iter()
            .filter(|p| p.category == category.as_str())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Product>> {
        Ok(self.inner.lock().unwrap().products.clone())
    }

    async fn list_all_skus(&self) -> Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .products
            .iter()
            .map(|p| p.sku.clone())
            .collect())
    }

    async fn sku_id_map(&self) -> Result<HashMap<String, i64>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .products
            .iter()
            .map(|p| (p.sku.clone(), p.id))
            .collect())
    }

    async fn upsert_batch(&self, records: &[ProductRecord]) -> Result<()> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        for record in records {
            let now = Utc::now();
            if let Some(existing) = inner.products.iter_mut().find(|p| p.sku == record.sku) {
                existing.product_name = record.product_name.clone();
                existing.brand = record.brand.clone();
                existing.series = record.series.clone();
                existing.family = record.family.clone();
                existing.category = record.category.clone();
                existing.length = record.length;
                existing.width = record.width;
                existing.height = record.height;
                existing.nominal_dimensions = record.nominal_dimensions.clone();
                existing.attributes = Some(record.attributes.clone());
                existing.product_page_url = record.product_page_url.clone();
                existing.image_url = record.image_url.clone();
                existing.ranking = record.ranking;
                existing.updated_at = now;
            } else {
                inner.next_product_id += 1;
                let id = inner.next_product_id;
                inner.products.push(Product {
                    id,
                    sku: record.sku.clone(),
                    product_name: record.product_name.clone(),
                    brand: record.brand.clone(),
                    series: record.series.clone(),
                    family: record.family.clone(),
                    category: record.category.clone(),
                    length: record.length,
                    width: record.width,
                    height: record.height,
                    nominal_dimensions: record.nominal_dimensions.clone(),
                    attributes: Some(record.attributes.clone()),
                    product_page_url: record.product_page_url.clone(),
                    image_url: record.image_url.clone(),
                    ranking: record.ranking,
                    created_at: now,
                    updated_at: now,
                });
            }
        }
        Ok(())
    }

    async fn delete_batch(&self, skus: &[String]) -> Result<u64> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        let doomed: HashSet<i64> = inner
            .products
            .iter()
            .filter(|p| skus.contains(&p.sku))
            .map(|p| p.id)
            .collect();
        let before = inner.products.len();
        inner.products.retain(|p| !doomed.contains(&p.id));
        // Edge rows cascade with their products.
        inner.edges.retain(|e| {
            !doomed.contains(&e.base_product_id) && !doomed.contains(&e.compatible_product_id)
        });
        Ok((before - inner.products.len()) as u64)
    }

    async fn list_edges_from(&self, sku: &str) -> Result<Vec<StoredPartner>> {
        let canonical = canonical_sku(sku);
        let inner = self.inner.lock().unwrap();
        let Some(base) = inner.products.iter().find(|p| p.sku == canonical) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&EdgeRow> = inner
            .edges
            .iter()
            .filter(|e| e.base_product_id == base.id)
            .filter(|e| e.incompatibility_reason.as_deref().unwrap_or("").is_empty())
            .collect();
        rows.sort_by(|a, b| {
            b.compatibility_score
                .cmp(&a.compatibility_score)
                .then(a.id.cmp(&b.id))
        });

        Ok(rows
            .into_iter()
            .filter_map(|e| {
                let partner = inner
                    .products
                    .iter()
                    .find(|p| p.id == e.compatible_product_id)?;
                Some(StoredPartner {
                    sku: partner.sku.clone(),
                    product_name: partner.product_name.clone(),
                    brand: partner.brand.clone(),
                    series: partner.series.clone(),
                    category: partner.category.clone(),
                    product_page_url: partner.product_page_url.clone(),
                    image_url: partner.image_url.clone(),
                    attributes: partner.attributes.clone(),
                    ranking: partner.ranking,
                    compatibility_score: Some(e.compatibility_score),
                })
            })
            .collect())
    }

    async fn replace_edges_from(&self, base_sku: &str, edges: &[EdgeRecord]) -> Result<()> {
        self.check_failure()?;
        let canonical = canonical_sku(base_sku);
        let mut inner = self.inner.lock().unwrap();
        let Some(base_id) = inner
            .products
            .iter()
            .find(|p| p.sku == canonical)
            .map(|p| p.id)
        else {
            return Err(CatalogError::InvalidInput(format!(
                "unknown product {base_sku}"
            )));
        };
        inner.edges.retain(|e| e.base_product_id != base_id);
        for edge in edges {
            insert_edge(&mut inner, edge);
        }
        Ok(())
    }

    async fn delete_edges_touching(&self, product_ids: &[i64]) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.edges.len();
        inner.edges.retain(|e| {
            !product_ids.contains(&e.base_product_id)
                && !product_ids.contains(&e.compatible_product_id)
        });
        Ok((before - inner.edges.len()) as u64)
    }

    async fn bulk_insert_edges(&self, edges: &[EdgeRecord]) -> Result<u64> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        let mut inserted = 0u64;
        for edge in edges {
            if edge.base_product_id == edge.compatible_product_id {
                continue;
            }
            if insert_edge(&mut inner, edge) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn list_skus_missing_edges(&self, limit: i64) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let with_edges: HashSet<i64> = inner.edges.iter().map(|e| e.base_product_id).collect();
        Ok(inner
            .products
            .iter()
            .filter(|p| !with_edges.contains(&p.id))
            .take(limit.max(0) as usize)
            .map(|p| p.sku.clone())
            .collect())
    }

    async fn create_sync(&self, sync_type: &str, source_url: Option<&str>) -> Result<SyncRecord> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_sync_id += 1;
        let record = SyncRecord {
            id: inner.next_sync_id,
            sync_type: sync_type.to_string(),
            status: SyncState::Queued.as_str().to_string(),
            source_url: source_url.map(|s| s.to_string()),
            started_at: Utc::now(),
            completed_at: None,
            products_added: 0,
            products_updated: 0,
            products_deleted: 0,
            compatibilities_updated: 0,
            error_message: None,
            sync_metadata: None,
        };
        inner.syncs.push(record.clone());
        Ok(record)
    }

    async fn set_sync_processing(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.syncs.iter_mut().find(|s| s.id == id) {
            record.status = SyncState::Processing.as_str().to_string();
        }
        Ok(())
    }

    async fn complete_sync(&self, id: i64, counts: SyncCounts, metadata: Value) -> Result<()> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.syncs.iter_mut().find(|s| s.id == id) {
            record.status = SyncState::Completed.as_str().to_string();
            record.completed_at = Some(Utc::now());
            record.products_added = counts.added;
            record.products_updated = counts.updated;
            record.products_deleted = counts.deleted;
            record.compatibilities_updated = counts.compatibilities;
            record.sync_metadata = Some(metadata);
        }
        Ok(())
    }

    async fn fail_sync(&self, id: i64, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.syncs.iter_mut().find(|s| s.id == id) {
            record.status = SyncState::Failed.as_str().to_string();
            record.completed_at = Some(Utc::now());
            record.error_message = Some(error.to_string());
        }
        Ok(())
    }

    async fn get_sync(&self, id: i64) -> Result<Option<SyncRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .syncs
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn recent_syncs(&self, limit: i64) -> Result<Vec<SyncRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<SyncRecord> = inner.syncs.clone();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn fail_interrupted(&self, message: &str) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0;
        for record in inner.syncs.iter_mut() {
            if record.status == SyncState::Processing.as_str() {
                record.status = SyncState::Failed.as_str().to_string();
                record.completed_at = Some(Utc::now());
                record.error_message = Some(message.to_string());
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Pair-unique insert; an existing pair is left untouched.
fn insert_edge(inner: &mut Inner, edge: &EdgeRecord) -> bool {
    let exists = inner.edges.iter().any(|e| {
        e.base_product_id == edge.base_product_id
            && e.compatible_product_id == edge.compatible_product_id
    });
    if exists {
        return false;
    }
    inner.next_edge_id += 1;
    inner.edges.push(EdgeRow {
        id: inner.next_edge_id,
        base_product_id: edge.base_product_id,
        compatible_product_id: edge.compatible_product_id,
        compatibility_score: edge.compatibility_score,
        match_reason: edge.match_reason.clone(),
        incompatibility_reason: edge.incompatibility_reason.clone(),
    });
    true
}

/// Build a snapshot from loose feed products, grouped by category.
pub fn snapshot_of(products: Vec<FeedProduct>) -> CatalogSnapshot {
    let mut sheets: HashMap<Category, Vec<FeedProduct>> = HashMap::new();
    for p in products {
        sheets.entry(p.category).or_default().push(p);
    }
    CatalogSnapshot::new(sheets, Utc::now())
}
