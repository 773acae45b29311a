//! # Lookup Service
//!
//! Resolves a SKU to its product record plus categorized partner lists.
//! Anchor products are matched live against the current feed snapshot;
//! partner-side products are served from the materialized edge set
//! (score descending), falling back to a live reverse match when no edges
//! have been computed yet. Whitelist/blacklist overrides are layered on
//! top, and results are memoized per SKU until the materializer
//! invalidates the cache wholesale.

use crate::{
    canonical_sku,
    error::{CatalogError, Result},
    feed::{FeedProduct, SnapshotHolder},
    overrides::OverrideStore,
    product::{CatalogStore, Product, StoredPartner},
    rules::{self, GroupOutcome, PartnerGroup, PartnerMatch},
    Category,
};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-SKU result cache. Readers may serve a stale entry while an
/// invalidation races them; they pick up fresh data on their next call.
#[derive(Default)]
pub struct QueryCache {
    entries: DashMap<String, Arc<LookupResult>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sku: &str) -> Option<Arc<LookupResult>> {
        self.entries.get(sku).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, sku: String, result: Arc<LookupResult>) {
        self.entries.insert(sku, result);
    }

    pub fn clear(&self) {
        let size = self.entries.len();
        self.entries.clear();
        if size > 0 {
            info!("Lookup cache cleared ({} entries)", size);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Projection of the queried product itself.
#[derive(Debug, Clone, Serialize)]
pub struct SourceProduct {
    pub sku: String,
    pub category: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub series: Option<String>,
    pub family: Option<String>,
    pub installation: Option<String>,
    pub nominal_dimensions: Option<String>,
    pub image_url: Option<String>,
    pub product_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_door_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_door_height: Option<f64>,
}

/// One partner category in the response: either products or an explicit
/// incompatibility reason.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<PartnerMatch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incompatibility_reason: Option<String>,
}

/// Full lookup response.
#[derive(Debug, Clone, Serialize, Default)]
pub struct LookupResult {
    pub product: Option<SourceProduct>,
    pub compatibles: Vec<CategoryGroup>,
    pub incompatibility_reasons: BTreeMap<String, String>,
}

pub struct LookupService {
    store: Arc<dyn CatalogStore>,
    snapshots: Arc<SnapshotHolder>,
    overrides: Arc<OverrideStore>,
    cache: Arc<QueryCache>,
}

impl LookupService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        snapshots: Arc<SnapshotHolder>,
        overrides: Arc<OverrideStore>,
        cache: Arc<QueryCache>,
    ) -> Self {
        Self {
            store,
            snapshots,
            overrides,
            cache,
        }
    }

    pub fn cache(&self) -> Arc<QueryCache> {
        self.cache.clone()
    }

    pub async fn lookup(&self, raw_sku: &str) -> Result<Arc<LookupResult>> {
        let sku = canonical_sku(raw_sku);
        if sku.is_empty() {
            return Err(CatalogError::InvalidInput("empty SKU".to_string()));
        }

        if let Some(hit) = self.cache.get(&sku) {
            debug!("Lookup cache hit for {}", sku);
            return Ok(hit);
        }

        let Some(row) = self.store.get_by_sku(&sku).await? else {
            debug!("No product found for SKU {}", sku);
            return Ok(Arc::new(LookupResult::default()));
        };

        let snapshot = self.snapshots.current();
        let feed_product = snapshot
            .find(&sku)
            .cloned()
            .or_else(|| row.to_feed_product());

        let groups = match (&feed_product, row.category()) {
            (Some(product), Some(category)) if category.is_anchor() => {
                rules::match_anchor(product, &snapshot)
            }
            _ => {
                let partners = self.store.list_edges_from(&sku).await?;
                if partners.is_empty() {
                    // Nothing materialized yet; compute the reverse view live.
                    match &feed_product {
                        Some(product) => rules::match_reverse(product, &snapshot),
                        None => Vec::new(),
                    }
                } else {
                    group_stored_partners(partners)
                }
            }
        };

        let mut groups = to_working_groups(groups);
        self.apply_blacklist(&sku, &mut groups);
        self.apply_whitelist(&sku, &mut groups).await?;

        let result = Arc::new(assemble(&sku, &row, feed_product.as_ref(), groups));
        self.cache.insert(sku, result.clone());
        Ok(result)
    }

    fn apply_blacklist(&self, sku: &str, groups: &mut Vec<WorkingGroup>) {
        for group in groups.iter_mut() {
            let before = group.products.len();
            group
                .products
                .retain(|p| p.sku != sku && !self.overrides.is_blacklisted(sku, &p.sku));
            if before != group.products.len() {
                info!(
                    "Blacklist removed {} item(s) from {} for SKU {}",
                    before - group.products.len(),
                    group.category,
                    sku
                );
            }
        }
        groups.retain(|g| !g.products.is_empty() || g.reason.is_some());
    }

    async fn apply_whitelist(&self, sku: &str, groups: &mut Vec<WorkingGroup>) -> Result<()> {
        for wl_sku in self.overrides.whitelisted_partners_of(sku) {
            let already_listed = groups
                .iter()
                .any(|g| g.products.iter().any(|p| p.sku == wl_sku));
            if already_listed {
                continue;
            }

            let Some((category, partner)) = self.resolve_partner(&wl_sku).await? else {
                continue;
            };
            let category_name = category.as_str().to_string();

            match groups.iter_mut().find(|g| g.category == category_name) {
                Some(group) => {
                    if group.reason.take().is_some() {
                        info!(
                            "Whitelist override replaced incompatibility reason for {} on SKU {}",
                            category_name, sku
                        );
                    }
                    group.products.push(partner);
                }
                None => groups.push(WorkingGroup {
                    category: category_name,
                    products: vec![partner],
                    reason: None,
                }),
            }
        }
        Ok(())
    }

    /// Locate a whitelisted counterpart: the live snapshot first, the
    /// store as fallback. Absent from both means it is skipped.
    async fn resolve_partner(&self, sku: &str) -> Result<Option<(Category, PartnerMatch)>> {
        let snapshot = self.snapshots.current();
        if let Some(product) = snapshot.find(sku) {
            return Ok(Some((product.category, PartnerMatch::from_product(product))));
        }
        if let Some(row) = self.store.get_by_sku(sku).await? {
            if let Some(feed) = row.to_feed_product() {
                return Ok(Some((feed.category, PartnerMatch::from_product(&feed))));
            }
        }
        Ok(None)
    }
}

/// Intermediate category group while overrides are applied.
struct WorkingGroup {
    category: String,
    products: Vec<PartnerMatch>,
    reason: Option<String>,
}

fn to_working_groups(groups: Vec<PartnerGroup>) -> Vec<WorkingGroup> {
    groups
        .into_iter()
        .map(|g| {
            let category = g.category.as_str().to_string();
            match g.outcome {
                GroupOutcome::Products(products) => WorkingGroup {
                    category,
                    products,
                    reason: None,
                },
                GroupOutcome::Incompatible(reason) => WorkingGroup {
                    category,
                    products: Vec::new(),
                    reason: Some(reason),
                },
            }
        })
        .collect()
}

/// Group stored partners by category, preserving the storage's score
/// order both across and within categories.
fn group_stored_partners(partners: Vec<StoredPartner>) -> Vec<PartnerGroup> {
    let mut order: Vec<Category> = Vec::new();
    let mut buckets: BTreeMap<&'static str, Vec<PartnerMatch>> = BTreeMap::new();

    for partner in partners {
        let Some(category) = Category::from_name(&partner.category) else {
            continue;
        };
        if !order.contains(&category) {
            order.push(category);
        }
        buckets
            .entry(category.as_str())
            .or_default()
            .push(stored_to_match(&partner));
    }

    order
        .into_iter()
        .map(|category| PartnerGroup {
            category,
            // Storage order already reflects the score index.
            outcome: GroupOutcome::Products(buckets.remove(category.as_str()).unwrap_or_default()),
        })
        .collect()
}

fn stored_to_match(partner: &StoredPartner) -> PartnerMatch {
    PartnerMatch {
        sku: partner.sku.clone(),
        is_combo: false,
        rank: partner.ranking.map(|r| r as f64).unwrap_or(999.0),
        name: partner.product_name.clone(),
        brand: partner.brand.clone(),
        series: partner.series.clone(),
        nominal_dimensions: None,
        glass_thickness: partner.glass_thickness(),
        door_type: partner.door_type(),
        max_door_width: None,
        material: None,
        image_url: partner.image_url.clone(),
        product_page_url: partner.product_page_url.clone(),
        main_product: None,
        secondary_product: None,
    }
}

fn assemble(
    sku: &str,
    row: &Product,
    feed_product: Option<&FeedProduct>,
    groups: Vec<WorkingGroup>,
) -> LookupResult {
    let mut incompatibility_reasons = BTreeMap::new();
    let mut compatibles = Vec::new();

    for group in groups {
        if let Some(reason) = &group.reason {
            incompatibility_reasons.insert(group.category.clone(), reason.clone());
        }
        compatibles.push(CategoryGroup {
            category: group.category,
            products: if group.reason.is_none() {
                Some(group.products)
            } else {
                None
            },
            incompatibility_reason: group.reason,
        });
    }

    LookupResult {
        product: Some(source_product(sku, row, feed_product)),
        compatibles,
        incompatibility_reasons,
    }
}

fn source_product(sku: &str, row: &Product, feed: Option<&FeedProduct>) -> SourceProduct {
    let category = row.category();
    let is_anchor = category.map(|c| c.is_anchor()).unwrap_or(false);
    let is_unit = matches!(category, Some(Category::Showers | Category::TubShowers));

    let (installation, max_door_width, max_door_height) = match feed {
        Some(p) => (
            p.installation(),
            if is_anchor {
                p.max_door_width()
            } else {
                p.maximum_width()
            },
            if is_unit { p.max_door_height() } else { None },
        ),
        None => (None, None, None),
    };

    SourceProduct {
        sku: sku.to_string(),
        category: row.category.clone(),
        name: row.product_name.clone(),
        brand: row.brand.clone(),
        series: row.series.clone(),
        family: row.family.clone(),
        installation,
        nominal_dimensions: row.nominal_dimensions.clone(),
        image_url: row.image_url.clone(),
        product_page_url: row.product_page_url.clone(),
        max_door_width,
        max_door_height,
    }
}
