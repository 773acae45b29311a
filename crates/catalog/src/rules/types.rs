//! Matcher output types.

use crate::{feed::FeedProduct, Category};
use serde::Serialize;

/// One component of a compound door + return-panel match.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComboComponent {
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal_dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glass_thickness: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_page_url: Option<String>,
}

impl ComboComponent {
    pub fn from_product(p: &FeedProduct) -> Self {
        Self {
            sku: p.sku.clone(),
            name: p.name.clone(),
            brand: p.brand.clone(),
            series: p.series.clone(),
            nominal_dimensions: p.nominal_dimensions.clone(),
            glass_thickness: p.glass_thickness(),
            material: p.material(),
            image_url: p.image_url.clone(),
            product_page_url: p.product_page_url.clone(),
        }
    }
}

/// A partner product produced by a matcher, enriched with the display
/// fields the lookup response carries. The internal ordering rank is never
/// serialized.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PartnerMatch {
    pub sku: String,
    pub is_combo: bool,
    /// Ordering key (the partner's ranking, 999 when absent). Internal;
    /// stripped from responses by the serde skip.
    #[serde(skip)]
    pub rank: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal_dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glass_thickness: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub door_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_door_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_product: Option<ComboComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_product: Option<ComboComponent>,
}

impl PartnerMatch {
    pub fn from_product(p: &FeedProduct) -> Self {
        Self {
            sku: p.sku.clone(),
            is_combo: false,
            rank: p.rank(),
            name: p.name.clone(),
            brand: p.brand.clone(),
            series: p.series.clone(),
            nominal_dimensions: p.nominal_dimensions.clone(),
            glass_thickness: p.glass_thickness(),
            door_type: p.door_type(),
            max_door_width: p.maximum_width(),
            material: p.material(),
            image_url: p.image_url.clone(),
            product_page_url: p.product_page_url.clone(),
            main_product: None,
            secondary_product: None,
        }
    }

    /// A door + return-panel pairing. The compound SKU is
    /// `"<doorSKU>|<panelSKU>"` and the rank comes from the door.
    pub fn combo(door: &FeedProduct, panel: &FeedProduct) -> Self {
        Self {
            sku: format!("{}|{}", door.sku, panel.sku),
            is_combo: true,
            rank: door.rank(),
            name: door.name.clone(),
            brand: None,
            series: None,
            nominal_dimensions: None,
            glass_thickness: None,
            door_type: None,
            max_door_width: None,
            material: None,
            image_url: None,
            product_page_url: None,
            main_product: Some(ComboComponent::from_product(door)),
            secondary_product: Some(ComboComponent::from_product(panel)),
        }
    }

    /// SKUs of the underlying catalog products: one for a plain match,
    /// both components for a compound.
    pub fn component_skus(&self) -> Vec<&str> {
        if self.is_combo {
            self.sku.split('|').collect()
        } else {
            vec![self.sku.as_str()]
        }
    }
}

/// Outcome for one partner category: either a ranked partner list or an
/// explicit incompatibility annotation that suppresses the list.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    Products(Vec<PartnerMatch>),
    Incompatible(String),
}

/// A partner category with its outcome, in the matcher's category order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerGroup {
    pub category: Category,
    pub outcome: GroupOutcome,
}

impl PartnerGroup {
    pub fn products(category: Category, mut products: Vec<PartnerMatch>) -> Self {
        sort_by_rank(&mut products);
        Self {
            category,
            outcome: GroupOutcome::Products(products),
        }
    }

    pub fn incompatible(category: Category, reason: String) -> Self {
        Self {
            category,
            outcome: GroupOutcome::Incompatible(reason),
        }
    }

    pub fn product_list(&self) -> Option<&[PartnerMatch]> {
        match &self.outcome {
            GroupOutcome::Products(list) => Some(list),
            GroupOutcome::Incompatible(_) => None,
        }
    }

    pub fn incompatibility_reason(&self) -> Option<&str> {
        match &self.outcome {
            GroupOutcome::Incompatible(reason) => Some(reason),
            GroupOutcome::Products(_) => None,
        }
    }
}

/// Ascending by rank. `sort_by` is stable, so equal ranks keep their
/// insertion order.
pub fn sort_by_rank(products: &mut [PartnerMatch]) {
    products.sort_by(|a, b| a.rank.total_cmp(&b.rank));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_sku_and_components() {
        let door = FeedProduct::new("D2", Category::ShowerDoors).with_ranking(5.0);
        let panel = FeedProduct::new("P1", Category::ReturnPanels);
        let combo = PartnerMatch::combo(&door, &panel);
        assert_eq!(combo.sku, "D2|P1");
        assert!(combo.is_combo);
        assert_eq!(combo.rank, 5.0);
        assert_eq!(combo.component_skus(), vec!["D2", "P1"]);
    }

    #[test]
    fn rank_is_not_serialized() {
        let p = PartnerMatch::from_product(&FeedProduct::new("A", Category::Walls).with_ranking(1.0));
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("rank").is_none());
        assert!(json.get("_rank").is_none());
        assert_eq!(json.get("sku").unwrap(), "A");
    }

    #[test]
    fn sort_is_stable_on_rank_ties() {
        let mut list = vec![
            PartnerMatch::from_product(&FeedProduct::new("B", Category::Walls).with_ranking(2.0)),
            PartnerMatch::from_product(&FeedProduct::new("A", Category::Walls)),
            PartnerMatch::from_product(&FeedProduct::new("C", Category::Walls).with_ranking(2.0)),
        ];
        sort_by_rank(&mut list);
        let skus: Vec<&str> = list.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["B", "C", "A"]);
    }
}
