//! Differential sync of the catalog store against a loaded feed snapshot.
//!
//! Adds and updates are committed in category-sized batches; partial
//! progress is acceptable because each committed batch is internally
//! consistent. SKUs present in the store but absent from the feed are
//! deleted (edge rows cascade with them).

use crate::{
    error::{CatalogError, Result},
    feed::CatalogSnapshot,
    product::{CatalogStore, Product, ProductRecord, SyncCounts},
    Category,
};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Old/new values of one changed field.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldChange {
    pub old: String,
    pub new: String,
}

/// Identity of an added or deleted product.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSummary {
    pub sku: String,
    pub name: Option<String>,
    pub category: String,
}

/// An updated product with its field-level diff.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatedProduct {
    pub sku: String,
    pub name: Option<String>,
    pub category: String,
    pub changes: BTreeMap<String, FieldChange>,
}

/// Result of one differential sync run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiffReport {
    pub added: Vec<ChangeSummary>,
    pub updated: Vec<UpdatedProduct>,
    pub deleted: Vec<ChangeSummary>,
}

impl DiffReport {
    /// SKUs whose edges must be recomputed: added and updated.
    pub fn changed_skus(&self) -> HashSet<String> {
        self.added
            .iter()
            .map(|c| c.sku.clone())
            .chain(self.updated.iter().map(|c| c.sku.clone()))
            .collect()
    }

    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            added: self.added.len() as i32,
            updated: self.updated.len() as i32,
            deleted: self.deleted.len() as i32,
            compatibilities: 0,
        }
    }

    /// Per-category change details persisted on the sync record.
    pub fn to_metadata(&self) -> serde_json::Value {
        json!({
            "change_details": {
                "added_products": self.added,
                "updated_products": self.updated,
                "deleted_products": self.deleted,
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

pub struct DifferentialSync<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> DifferentialSync<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    pub async fn run(&self, snapshot: &CatalogSnapshot) -> Result<DiffReport> {
        let existing: HashMap<String, Product> = self
            .store
            .list_all()
            .await
            .map_err(abort)?
            .into_iter()
            .map(|p| (p.sku.clone(), p))
            .collect();

        let mut report = DiffReport::default();
        let mut feed_skus: HashSet<String> = HashSet::new();

        for category in Category::ALL {
            let Some(rows) = snapshot.category(category) else {
                continue;
            };
            debug!("Syncing category {} ({} rows)", category, rows.len());

            let mut batch: Vec<ProductRecord> = Vec::new();
            for row in rows {
                if !feed_skus.insert(row.sku.clone()) {
                    continue;
                }

                let record = ProductRecord::from(row);
                match existing.get(&row.sku) {
                    None => {
                        report.added.push(ChangeSummary {
                            sku: row.sku.clone(),
                            name: row.name.clone(),
                            category: category.as_str().to_string(),
                        });
                        batch.push(record);
                    }
                    Some(current) => {
                        let changes = diff_product(current, &record);
                        if !changes.is_empty() {
                            report.updated.push(UpdatedProduct {
                                sku: row.sku.clone(),
                                name: row.name.clone(),
                                category: category.as_str().to_string(),
                                changes,
                            });
                            batch.push(record);
                        }
                    }
                }
            }

            // Commit after each category; an abort keeps earlier batches.
            self.store.upsert_batch(&batch).await.map_err(abort)?;
        }

        let mut to_delete: Vec<&Product> = existing
            .values()
            .filter(|p| !feed_skus.contains(&p.sku))
            .collect();
        to_delete.sort_by(|a, b| a.sku.cmp(&b.sku));
        if !to_delete.is_empty() {
            info!("Removing {} products no longer in the feed", to_delete.len());
            for product in &to_delete {
                report.deleted.push(ChangeSummary {
                    sku: product.sku.clone(),
                    name: product.product_name.clone(),
                    category: product.category.clone(),
                });
            }
            let skus: Vec<String> = to_delete.iter().map(|p| p.sku.clone()).collect();
            self.store.delete_batch(&skus).await.map_err(abort)?;
        }

        info!(
            "Differential sync complete: {} added, {} updated, {} deleted",
            report.added.len(),
            report.updated.len(),
            report.deleted.len()
        );
        Ok(report)
    }
}

/// Storage failures mid-sync become `SyncAborted`; committed batches stay.
fn abort(error: CatalogError) -> CatalogError {
    match error {
        CatalogError::Database(e) => CatalogError::SyncAborted(e.to_string()),
        CatalogError::TransientStorage(msg) => CatalogError::SyncAborted(msg),
        other => other,
    }
}

/// Field-by-field comparison of the stored row against the fresh record.
/// Comparison is by value, not by rendering, so a `NUMERIC(10,2)` round
/// trip (`48.00` vs `48`) does not register as a change.
fn diff_product(current: &Product, record: &ProductRecord) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();

    push_if_changed(&mut changes, "Product Name", &current.product_name, &record.product_name);
    push_if_changed(&mut changes, "Brand", &current.brand, &record.brand);
    push_if_changed(&mut changes, "Series", &current.series, &record.series);
    push_if_changed(&mut changes, "Family", &current.family, &record.family);
    if current.category != record.category {
        changes.insert(
            "Category".to_string(),
            FieldChange {
                old: current.category.clone(),
                new: record.category.clone(),
            },
        );
    }
    push_if_changed(&mut changes, "Length", &current.length, &record.length);
    push_if_changed(&mut changes, "Width", &current.width, &record.width);
    push_if_changed(&mut changes, "Height", &current.height, &record.height);
    push_if_changed(
        &mut changes,
        "Nominal Dimensions",
        &current.nominal_dimensions,
        &record.nominal_dimensions,
    );
    push_if_changed(
        &mut changes,
        "Product Page URL",
        &current.product_page_url,
        &record.product_page_url,
    );
    push_if_changed(&mut changes, "Image URL", &current.image_url, &record.image_url);
    push_if_changed(&mut changes, "Ranking", &current.ranking, &record.ranking);

    let current_attrs = current
        .attributes
        .clone()
        .unwrap_or_else(|| json!({}));
    if current_attrs != record.attributes {
        changes.insert(
            "Attributes".to_string(),
            FieldChange {
                old: current_attrs.to_string(),
                new: record.attributes.to_string(),
            },
        );
    }

    changes
}

fn push_if_changed<T: PartialEq + std::fmt::Display>(
    changes: &mut BTreeMap<String, FieldChange>,
    field: &str,
    old: &Option<T>,
    new: &Option<T>,
) {
    if old != new {
        changes.insert(
            field.to_string(),
            FieldChange {
                old: display(old),
                new: display(new),
            },
        );
    }
}

fn display<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "None".to_string())
}
