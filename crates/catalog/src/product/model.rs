//! Catalog row models.

use crate::{feed::FeedProduct, Category};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Stored product row. Classified feed columns are dedicated columns;
/// everything else rides in `attributes` for round-trip fidelity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub series: Option<String>,
    pub family: Option<String>,
    pub category: String,
    pub length: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub nominal_dimensions: Option<String>,
    pub attributes: Option<Value>,
    pub product_page_url: Option<String>,
    pub image_url: Option<String>,
    pub ranking: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn category(&self) -> Option<Category> {
        Category::from_name(&self.category)
    }

    /// Rehydrate the in-memory feed representation from the stored row.
    /// Used when a product must be matched live but is absent from the
    /// current snapshot.
    pub fn to_feed_product(&self) -> Option<FeedProduct> {
        let category = self.category()?;
        let attributes: BTreeMap<String, Value> = match &self.attributes {
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Some(FeedProduct {
            sku: self.sku.clone(),
            name: self.product_name.clone(),
            brand: self.brand.clone(),
            series: self.series.clone(),
            family: self.family.clone(),
            category,
            length: self.length.and_then(|d| d.to_f64()),
            width: self.width.and_then(|d| d.to_f64()),
            height: self.height.and_then(|d| d.to_f64()),
            nominal_dimensions: self.nominal_dimensions.clone(),
            ranking: self.ranking.map(|r| r as f64),
            product_page_url: self.product_page_url.clone(),
            image_url: self.image_url.clone(),
            attributes,
        })
    }
}

/// Insert/update payload for one product, derived from a feed row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub sku: String,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub series: Option<String>,
    pub family: Option<String>,
    pub category: String,
    pub length: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub nominal_dimensions: Option<String>,
    pub attributes: Value,
    pub product_page_url: Option<String>,
    pub image_url: Option<String>,
    pub ranking: Option<i32>,
}

impl From<&FeedProduct> for ProductRecord {
    fn from(p: &FeedProduct) -> Self {
        Self {
            sku: p.sku.clone(),
            product_name: p.name.clone(),
            brand: p.brand.clone(),
            series: p.series.clone(),
            family: p.family.clone(),
            category: p.category.as_str().to_string(),
            length: p.length.and_then(Decimal::from_f64),
            width: p.width.and_then(Decimal::from_f64),
            height: p.height.and_then(Decimal::from_f64),
            nominal_dimensions: p.nominal_dimensions.clone(),
            attributes: Value::Object(p.attributes.clone().into_iter().collect()),
            product_page_url: p.product_page_url.clone(),
            image_url: p.image_url.clone(),
            ranking: p.ranking.map(|r| r as i32),
        }
    }
}

/// One directed compatibility edge, keyed by product ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeRecord {
    pub base_product_id: i64,
    pub compatible_product_id: i64,
    pub compatibility_score: i32,
    pub match_reason: Option<String>,
    pub incompatibility_reason: Option<String>,
}

/// Partner row returned by the stored-edge lookup path: the partner
/// product joined with its edge score, ordered score-descending by the
/// composite index.
#[derive(Debug, Clone, FromRow)]
pub struct StoredPartner {
    pub sku: String,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub series: Option<String>,
    pub category: String,
    pub product_page_url: Option<String>,
    pub image_url: Option<String>,
    pub attributes: Option<Value>,
    pub ranking: Option<i32>,
    pub compatibility_score: Option<i32>,
}

impl StoredPartner {
    fn attr_str(&self, key: &str) -> Option<String> {
        match &self.attributes {
            Some(Value::Object(map)) => map
                .get(key)
                .and_then(crate::feed::record::value_to_string),
            _ => None,
        }
    }

    pub fn glass_thickness(&self) -> Option<String> {
        self.attr_str("Glass Thickness").or_else(|| self.attr_str("Glass"))
    }

    pub fn door_type(&self) -> Option<String> {
        self.attr_str("Door Type")
            .or_else(|| self.attr_str("Door  Type"))
            .or_else(|| self.attr_str("Type"))
    }
}

/// Lifecycle states of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Queued => "queued",
            SyncState::Processing => "processing",
            SyncState::Completed => "completed",
            SyncState::Failed => "failed",
        }
    }
}

/// Durable record of one ingestion attempt.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SyncRecord {
    pub id: i64,
    pub sync_type: String,
    pub status: String,
    pub source_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub products_added: i32,
    pub products_updated: i32,
    pub products_deleted: i32,
    pub compatibilities_updated: i32,
    pub error_message: Option<String>,
    pub sync_metadata: Option<Value>,
}

/// Terminal counters for a completed sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncCounts {
    pub added: i32,
    pub updated: i32,
    pub deleted: i32,
    pub compatibilities: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_from_feed_product_preserves_attributes() {
        let feed = FeedProduct::new("FB03060M", Category::ShowerBases)
            .with_name("Base 48x32")
            .with_brand("Maax")
            .with_dimensions(48.0, 32.0)
            .with_str_attr("Installation", "Alcove")
            .with_num_attr("Max Door Width", 45.0);

        let record = ProductRecord::from(&feed);
        assert_eq!(record.sku, "FB03060M");
        assert_eq!(record.category, "Shower Bases");
        assert_eq!(record.length, Decimal::from_f64(48.0));
        assert_eq!(record.attributes["Installation"], json!("Alcove"));
        assert_eq!(record.attributes["Max Door Width"], json!(45.0));
    }

    #[test]
    fn product_round_trips_to_feed_product() {
        let product = Product {
            id: 7,
            sku: "W1".to_string(),
            product_name: Some("Wall".to_string()),
            brand: Some("Maax".to_string()),
            series: Some("MAAX".to_string()),
            family: Some("Utile".to_string()),
            category: "Walls".to_string(),
            length: Decimal::from_f64(60.0),
            width: Decimal::from_f64(32.0),
            height: None,
            nominal_dimensions: Some("60 x 32".to_string()),
            attributes: Some(json!({"Type": "Tub Wall", "Cut to Size": "Yes"})),
            product_page_url: None,
            image_url: None,
            ranking: Some(4),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let feed = product.to_feed_product().unwrap();
        assert_eq!(feed.category, Category::Walls);
        assert_eq!(feed.length, Some(60.0));
        assert!(feed.cut_to_size());
        assert_eq!(feed.rank(), 4.0);
    }

    #[test]
    fn stored_partner_reads_display_attributes() {
        let partner = StoredPartner {
            sku: "D1".to_string(),
            product_name: None,
            brand: None,
            series: None,
            category: "Shower Doors".to_string(),
            product_page_url: None,
            image_url: None,
            attributes: Some(json!({"Glass Thickness": "8mm", "Door  Type": "Sliding"})),
            ranking: None,
            compatibility_score: Some(100),
        };
        assert_eq!(partner.glass_thickness().as_deref(), Some("8mm"));
        assert_eq!(partner.door_type().as_deref(), Some("Sliding"));
    }
}
