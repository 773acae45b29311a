//! # Catalog Store
//!
//! Data access layer for products, compatibility edges and sync records.
//! The trait is the single storage seam of the system; the PostgreSQL
//! implementation leans on two indexes: the unique
//! `(base_product_id, compatible_product_id)` pair and the composite
//! `(base_product_id, compatibility_score DESC)` that serves ordered
//! partner reads without a sort.

use crate::{
    canonical_sku,
    error::{CatalogError, Result},
    product::model::{
        EdgeRecord, Product, ProductRecord, StoredPartner, SyncCounts, SyncRecord, SyncState,
    },
    Category,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, QueryBuilder};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Rows per bulk edge insert. Five binds per row keeps a chunk well under
/// the PostgreSQL parameter limit.
const EDGE_INSERT_CHUNK: usize = 500;
/// Attempts per chunk before a transient failure propagates.
const BULK_INSERT_RETRIES: usize = 3;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    // === Products ===
    async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>>;
    async fn list_by_category(&self, category: Category) -> Result<Vec<Product>>;
    async fn list_all(&self) -> Result<Vec<Product>>;
    async fn list_all_skus(&self) -> Result<Vec<String>>;
    /// SKU → product id lookup, built once per materialization run.
    async fn sku_id_map(&self) -> Result<HashMap<String, i64>>;
    /// Insert-or-update a batch. Within one batch the last write for a
    /// SKU wins; `created_at` is preserved on updates.
    async fn upsert_batch(&self, records: &[ProductRecord]) -> Result<()>;
    async fn delete_batch(&self, skus: &[String]) -> Result<u64>;

    // === Edges ===
    /// Outgoing positive edges with partner details, score descending.
    async fn list_edges_from(&self, sku: &str) -> Result<Vec<StoredPartner>>;
    /// Atomically replace all outgoing edges of `base_sku`.
    async fn replace_edges_from(&self, base_sku: &str, edges: &[EdgeRecord]) -> Result<()>;
    /// Remove every edge touching any of the products, both directions.
    async fn delete_edges_touching(&self, product_ids: &[i64]) -> Result<u64>;
    /// Insert edges with upsert semantics: in-batch duplicates collapse
    /// and collisions with existing rows are ignored.
    async fn bulk_insert_edges(&self, edges: &[EdgeRecord]) -> Result<u64>;
    /// Products with no outgoing edges, oldest first. Feeds the worker's
    /// back-fill pass.
    async fn list_skus_missing_edges(&self, limit: i64) -> Result<Vec<String>>;

    // === Sync records ===
    async fn create_sync(&self, sync_type: &str, source_url: Option<&str>) -> Result<SyncRecord>;
    async fn set_sync_processing(&self, id: i64) -> Result<()>;
    async fn complete_sync(&self, id: i64, counts: SyncCounts, metadata: Value) -> Result<()>;
    async fn fail_sync(&self, id: i64, error: &str) -> Result<()>;
    async fn get_sync(&self, id: i64) -> Result<Option<SyncRecord>>;
    async fn recent_syncs(&self, limit: i64) -> Result<Vec<SyncRecord>>;
    /// Mark syncs left `processing` by a dead process as failed.
    async fn fail_interrupted(&self, message: &str) -> Result<u64>;
}

/// PostgreSQL implementation.
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str = "id, sku, product_name, brand, series, family, category, \
     length, width, height, nominal_dimensions, attributes, \
     product_page_url, image_url, ranking, created_at, updated_at";

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1"
        ))
        .bind(canonical_sku(sku))
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn list_by_category(&self, category: Category) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category = $1 ORDER BY id"
        ))
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn list_all(&self) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn list_all_skus(&self) -> Result<Vec<String>> {
        let skus = sqlx::query_scalar::<_, String>("SELECT sku FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(skus)
    }

    async fn sku_id_map(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>("SELECT sku, id FROM products")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn upsert_batch(&self, records: &[ProductRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO products (
                    sku, product_name, brand, series, family, category,
                    length, width, height, nominal_dimensions, attributes,
                    product_page_url, image_url, ranking, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW(), NOW())
                ON CONFLICT (sku) DO UPDATE SET
                    product_name = EXCLUDED.product_name,
                    brand = EXCLUDED.brand,
                    series = EXCLUDED.series,
                    family = EXCLUDED.family,
                    category = EXCLUDED.category,
                    length = EXCLUDED.length,
                    width = EXCLUDED.width,
                    height = EXCLUDED.height,
                    nominal_dimensions = EXCLUDED.nominal_dimensions,
                    attributes = EXCLUDED.attributes,
                    product_page_url = EXCLUDED.product_page_url,
                    image_url = EXCLUDED.image_url,
                    ranking = EXCLUDED.ranking,
                    updated_at = NOW()
                "#,
            )
            .bind(&record.sku)
            .bind(&record.product_name)
            .bind(&record.brand)
            .bind(&record.series)
            .bind(&record.family)
            .bind(&record.category)
            .bind(record.length)
            .bind(record.width)
            .bind(record.height)
            .bind(&record.nominal_dimensions)
            .bind(&record.attributes)
            .bind(&record.product_page_url)
            .bind(&record.image_url)
            .bind(record.ranking)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_batch(&self, skus: &[String]) -> Result<u64> {
        if skus.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM products WHERE sku = ANY($1)")
            .bind(skus)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_edges_from(&self, sku: &str) -> Result<Vec<StoredPartner>> {
        let partners = sqlx::query_as::<_, StoredPartner>(
            r#"
            SELECT
                p.sku, p.product_name, p.brand, p.series, p.category,
                p.product_page_url, p.image_url, p.attributes, p.ranking,
                pc.compatibility_score
            FROM product_compatibility pc
            JOIN products base ON base.id = pc.base_product_id
            JOIN products p ON p.id = pc.compatible_product_id
            WHERE base.sku = $1
              AND (pc.incompatibility_reason IS NULL OR pc.incompatibility_reason = '')
            ORDER BY pc.compatibility_score DESC NULLS LAST, pc.id
            "#,
        )
        .bind(canonical_sku(sku))
        .fetch_all(&self.pool)
        .await?;
        Ok(partners)
    }

    async fn replace_edges_from(&self, base_sku: &str, edges: &[EdgeRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let base_id: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE sku = $1")
            .bind(canonical_sku(base_sku))
            .fetch_optional(&mut *tx)
            .await?;
        let Some(base_id) = base_id else {
            return Err(CatalogError::InvalidInput(format!(
                "unknown product {base_sku}"
            )));
        };

        sqlx::query("DELETE FROM product_compatibility WHERE base_product_id = $1")
            .bind(base_id)
            .execute(&mut *tx)
            .await?;

        for chunk in dedupe_edges(edges).chunks(EDGE_INSERT_CHUNK) {
            build_edge_insert(chunk).build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_edges_touching(&self, product_ids: &[i64]) -> Result<u64> {
        if product_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "DELETE FROM product_compatibility \
             WHERE base_product_id = ANY($1) OR compatible_product_id = ANY($1)",
        )
        .bind(product_ids)
        .execute(&self.pool)
        .await?;
        debug!(
            "Deleted {} edges touching {} products",
            result.rows_affected(),
            product_ids.len()
        );
        Ok(result.rows_affected())
    }

    async fn bulk_insert_edges(&self, edges: &[EdgeRecord]) -> Result<u64> {
        let deduped = dedupe_edges(edges);
        if deduped.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        for chunk in deduped.chunks(EDGE_INSERT_CHUNK) {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match build_edge_insert(chunk).build().execute(&self.pool).await {
                    Ok(result) => {
                        inserted += result.rows_affected();
                        break;
                    }
                    Err(e) if attempt < BULK_INSERT_RETRIES => {
                        warn!(
                            "Edge insert attempt {}/{} failed, retrying: {}",
                            attempt, BULK_INSERT_RETRIES, e
                        );
                    }
                    Err(e) => {
                        return Err(CatalogError::TransientStorage(format!(
                            "edge insert failed after {} attempts: {}",
                            BULK_INSERT_RETRIES, e
                        )));
                    }
                }
            }
        }
        Ok(inserted)
    }

    async fn list_skus_missing_edges(&self, limit: i64) -> Result<Vec<String>> {
        let skus = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.sku
            FROM products p
            LEFT JOIN product_compatibility pc ON p.id = pc.base_product_id
            WHERE pc.base_product_id IS NULL
            ORDER BY p.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(skus)
    }

    async fn create_sync(&self, sync_type: &str, source_url: Option<&str>) -> Result<SyncRecord> {
        let record = sqlx::query_as::<_, SyncRecord>(
            r#"
            INSERT INTO sync_status (sync_type, status, source_url, started_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, sync_type, status, source_url, started_at, completed_at,
                      products_added, products_updated, products_deleted,
                      compatibilities_updated, error_message, sync_metadata
            "#,
        )
        .bind(sync_type)
        .bind(SyncState::Queued.as_str())
        .bind(source_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn set_sync_processing(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sync_status SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(SyncState::Processing.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_sync(&self, id: i64, counts: SyncCounts, metadata: Value) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_status SET
                status = $2,
                completed_at = NOW(),
                products_added = $3,
                products_updated = $4,
                products_deleted = $5,
                compatibilities_updated = $6,
                sync_metadata = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(SyncState::Completed.as_str())
        .bind(counts.added)
        .bind(counts.updated)
        .bind(counts.deleted)
        .bind(counts.compatibilities)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_sync(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE sync_status SET status = $2, completed_at = NOW(), error_message = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(SyncState::Failed.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_sync(&self, id: i64) -> Result<Option<SyncRecord>> {
        let record = sqlx::query_as::<_, SyncRecord>(
            "SELECT id, sync_type, status, source_url, started_at, completed_at, \
                    products_added, products_updated, products_deleted, \
                    compatibilities_updated, error_message, sync_metadata \
             FROM sync_status WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn recent_syncs(&self, limit: i64) -> Result<Vec<SyncRecord>> {
        let records = sqlx::query_as::<_, SyncRecord>(
            "SELECT id, sync_type, status, source_url, started_at, completed_at, \
                    products_added, products_updated, products_deleted, \
                    compatibilities_updated, error_message, sync_metadata \
             FROM sync_status ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn fail_interrupted(&self, message: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sync_status SET status = $1, completed_at = NOW(), error_message = $2 \
             WHERE status = $3",
        )
        .bind(SyncState::Failed.as_str())
        .bind(message)
        .bind(SyncState::Processing.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            warn!(
                "Marked {} interrupted sync(s) as failed",
                result.rows_affected()
            );
        }
        Ok(result.rows_affected())
    }
}

/// Collapse in-batch duplicates on the `(base, partner)` pair, first
/// occurrence wins. Self-edges are dropped outright.
fn dedupe_edges(edges: &[EdgeRecord]) -> Vec<EdgeRecord> {
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    edges
        .iter()
        .filter(|e| e.base_product_id != e.compatible_product_id)
        .filter(|e| seen.insert((e.base_product_id, e.compatible_product_id)))
        .cloned()
        .collect()
}

fn build_edge_insert(chunk: &[EdgeRecord]) -> QueryBuilder<'_, sqlx::Postgres> {
    let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "INSERT INTO product_compatibility \
         (base_product_id, compatible_product_id, compatibility_score, match_reason, incompatibility_reason) ",
    );
    builder.push_values(chunk, |mut b, edge| {
        b.push_bind(edge.base_product_id)
            .push_bind(edge.compatible_product_id)
            .push_bind(edge.compatibility_score)
            .push_bind(edge.match_reason.clone())
            .push_bind(edge.incompatibility_reason.clone());
    });
    builder.push(" ON CONFLICT (base_product_id, compatible_product_id) DO NOTHING");
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(base: i64, partner: i64) -> EdgeRecord {
        EdgeRecord {
            base_product_id: base,
            compatible_product_id: partner,
            compatibility_score: 100,
            match_reason: Some("Compatible Walls".to_string()),
            incompatibility_reason: None,
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence_and_drops_self_edges() {
        let mut second = edge(1, 2);
        second.compatibility_score = 50;
        let edges = vec![edge(1, 2), second, edge(2, 1), edge(3, 3)];
        let deduped = dedupe_edges(&edges);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].compatibility_score, 100);
        assert_eq!(
            (deduped[1].base_product_id, deduped[1].compatible_product_id),
            (2, 1)
        );
    }

    #[test]
    fn edge_insert_sql_carries_conflict_clause() {
        let chunk = vec![edge(1, 2)];
        let sql = build_edge_insert(&chunk).into_sql();
        assert!(sql.contains("ON CONFLICT"));
        assert!(sql.contains("DO NOTHING"));
    }
}
