//! Bidirectional edge materialization for changed products.
//!
//! For each changed SKU every edge touching it is deleted (both
//! directions), the matcher for its category is re-run against the
//! current snapshot, and each match is written as a forward edge plus a
//! `Reverse: `-prefixed mirror with the same score. Inserts are chunked
//! and pair-idempotent, so a replay of the same change set converges to
//! the same edge set.

use crate::{
    canonical_sku,
    error::Result,
    feed::SnapshotHolder,
    product::{CatalogStore, EdgeRecord},
    query::QueryCache,
    rules,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Score attached to every materialized edge; the storage orders partner
/// reads by it (higher first).
const EDGE_SCORE: i32 = 100;
/// Pending edges are flushed to storage in groups of this size.
const FLUSH_THRESHOLD: usize = 500;

pub struct GraphMaterializer<'a> {
    store: &'a dyn CatalogStore,
    snapshots: &'a SnapshotHolder,
    cache: &'a QueryCache,
}

impl<'a> GraphMaterializer<'a> {
    pub fn new(
        store: &'a dyn CatalogStore,
        snapshots: &'a SnapshotHolder,
        cache: &'a QueryCache,
    ) -> Self {
        Self {
            store,
            snapshots,
            cache,
        }
    }

    /// Recompute edges for the given SKUs. Returns the number of edge
    /// rows written.
    pub async fn materialize(&self, changed_skus: &HashSet<String>) -> Result<u64> {
        if changed_skus.is_empty() {
            return Ok(0);
        }
        info!("Recomputing compatibilities for {} products", changed_skus.len());

        let sku_ids = self.store.sku_id_map().await?;

        let mut ordered: Vec<String> = changed_skus.iter().map(|s| canonical_sku(s)).collect();
        ordered.sort();
        ordered.dedup();

        let changed_ids: Vec<i64> = ordered
            .iter()
            .filter_map(|sku| sku_ids.get(sku).copied())
            .collect();
        if changed_ids.is_empty() {
            return Ok(0);
        }

        self.store.delete_edges_touching(&changed_ids).await?;

        let snapshot = self.snapshots.current();
        let mut pending: Vec<EdgeRecord> = Vec::new();
        let mut written = 0u64;

        for sku in &ordered {
            let Some(&base_id) = sku_ids.get(sku) else {
                continue;
            };
            let Some(product) = snapshot.find(sku) else {
                debug!("Changed SKU {} not present in snapshot; skipping", sku);
                continue;
            };

            let groups = rules::match_any(product, &snapshot);
            let mut seen_partners: HashSet<i64> = HashSet::new();

            for group in groups {
                // Negative annotations stay a live-path concern; only
                // positive matches are materialized.
                let Some(matches) = group.product_list() else {
                    continue;
                };
                let reason = format!("Compatible {}", group.category);

                for partner in matches {
                    for component in partner.component_skus() {
                        let component_sku = canonical_sku(component);
                        if component_sku == *sku {
                            continue;
                        }
                        let Some(&partner_id) = sku_ids.get(&component_sku) else {
                            continue;
                        };
                        if !seen_partners.insert(partner_id) {
                            continue;
                        }

                        pending.push(EdgeRecord {
                            base_product_id: base_id,
                            compatible_product_id: partner_id,
                            compatibility_score: EDGE_SCORE,
                            match_reason: Some(reason.clone()),
                            incompatibility_reason: None,
                        });
                        pending.push(EdgeRecord {
                            base_product_id: partner_id,
                            compatible_product_id: base_id,
                            compatibility_score: EDGE_SCORE,
                            match_reason: Some(format!("Reverse: {}", reason)),
                            incompatibility_reason: None,
                        });

                        if pending.len() >= FLUSH_THRESHOLD {
                            written += self.store.bulk_insert_edges(&pending).await?;
                            pending.clear();
                        }
                    }
                }
            }
        }

        if !pending.is_empty() {
            written += self.store.bulk_insert_edges(&pending).await?;
        }

        // Readers may keep serving stale entries mid-run; the wholesale
        // clear lands only after every insert.
        self.cache.clear();

        info!("Materialization complete: {} edge rows written", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedProduct;
    use crate::sync::DifferentialSync;
    use crate::testing::{snapshot_of, MemoryCatalogStore};
    use crate::Category;

    fn catalog() -> Vec<FeedProduct> {
        vec![
            FeedProduct::new("B1", Category::ShowerBases)
                .with_brand("Maax")
                .with_series("MAAX")
                .with_family("B3")
                .with_nominal("48 x 32")
                .with_str_attr("Installation", "Alcove")
                .with_num_attr("Max Door Width", 45.0),
            FeedProduct::new("D1", Category::ShowerDoors)
                .with_series("Collection")
                .with_num_attr("Minimum Width", 44.0)
                .with_num_attr("Maximum Width", 50.0),
            FeedProduct::new("W1", Category::Walls)
                .with_brand("Maax")
                .with_series("MAAX")
                .with_family("Utile")
                .with_nominal("48 x 32")
                .with_str_attr("Type", "Alcove Shower Wall"),
        ]
    }

    async fn seeded_store() -> (MemoryCatalogStore, crate::feed::CatalogSnapshot) {
        let store = MemoryCatalogStore::new();
        let snapshot = snapshot_of(catalog());
        DifferentialSync::new(&store).run(&snapshot).await.unwrap();
        (store, snapshot)
    }

    #[tokio::test]
    async fn forward_edges_get_reverse_mirrors_with_equal_score() {
        let (store, snapshot) = seeded_store().await;
        let holder = SnapshotHolder::with_snapshot(snapshot);
        let cache = QueryCache::new();

        let changed: HashSet<String> = ["B1".to_string()].into_iter().collect();
        GraphMaterializer::new(&store, &holder, &cache)
            .materialize(&changed)
            .await
            .unwrap();

        let pairs = store.edge_pairs();
        for (base, partner, score) in &pairs {
            assert!(
                pairs
                    .iter()
                    .any(|(b, p, s)| b == partner && p == base && s == score),
                "missing reverse of {base}->{partner}"
            );
        }
        assert!(pairs.iter().any(|(b, p, _)| b == "B1" && p == "D1"));
        assert!(pairs.iter().any(|(b, p, _)| b == "B1" && p == "W1"));
    }

    #[tokio::test]
    async fn reverse_edges_carry_prefixed_reason() {
        let (store, snapshot) = seeded_store().await;
        let holder = SnapshotHolder::with_snapshot(snapshot);
        let cache = QueryCache::new();

        let changed: HashSet<String> = ["B1".to_string()].into_iter().collect();
        GraphMaterializer::new(&store, &holder, &cache)
            .materialize(&changed)
            .await
            .unwrap();

        assert_eq!(
            store.match_reason_of("B1", "D1").as_deref(),
            Some("Compatible Shower Doors")
        );
        assert_eq!(
            store.match_reason_of("D1", "B1").as_deref(),
            Some("Reverse: Compatible Shower Doors")
        );
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let (store, snapshot) = seeded_store().await;
        let holder = SnapshotHolder::with_snapshot(snapshot);
        let cache = QueryCache::new();
        let materializer = GraphMaterializer::new(&store, &holder, &cache);

        let changed: HashSet<String> = ["B1".to_string(), "D1".to_string(), "W1".to_string()]
            .into_iter()
            .collect();
        materializer.materialize(&changed).await.unwrap();
        let first = {
            let mut pairs = store.edge_pairs();
            pairs.sort();
            pairs
        };

        materializer.materialize(&changed).await.unwrap();
        let second = {
            let mut pairs = store.edge_pairs();
            pairs.sort();
            pairs
        };
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn partner_side_change_restores_both_directions() {
        let (store, snapshot) = seeded_store().await;
        let holder = SnapshotHolder::with_snapshot(snapshot);
        let cache = QueryCache::new();
        let materializer = GraphMaterializer::new(&store, &holder, &cache);

        // Materialize from the anchor first, then re-materialize only the
        // wall; the anchor<->wall edges must survive the second pass.
        materializer
            .materialize(&["B1".to_string()].into_iter().collect())
            .await
            .unwrap();
        materializer
            .materialize(&["W1".to_string()].into_iter().collect())
            .await
            .unwrap();

        let pairs = store.edge_pairs();
        assert!(pairs.iter().any(|(b, p, _)| b == "B1" && p == "W1"));
        assert!(pairs.iter().any(|(b, p, _)| b == "W1" && p == "B1"));
    }

    #[tokio::test]
    async fn unknown_and_unsnapshotted_skus_are_skipped() {
        let (store, snapshot) = seeded_store().await;
        let holder = SnapshotHolder::with_snapshot(snapshot);
        let cache = QueryCache::new();

        let changed: HashSet<String> = ["GHOST".to_string()].into_iter().collect();
        let written = GraphMaterializer::new(&store, &holder, &cache)
            .materialize(&changed)
            .await
            .unwrap();
        assert_eq!(written, 0);
        assert_eq!(store.edge_count(), 0);
    }

    #[tokio::test]
    async fn cache_is_invalidated_after_materialization() {
        let (store, snapshot) = seeded_store().await;
        let holder = SnapshotHolder::with_snapshot(snapshot);
        let cache = QueryCache::new();
        cache.insert(
            "B1".to_string(),
            std::sync::Arc::new(crate::query::LookupResult::default()),
        );

        GraphMaterializer::new(&store, &holder, &cache)
            .materialize(&["B1".to_string()].into_iter().collect())
            .await
            .unwrap();
        assert!(cache.is_empty());
    }
}
