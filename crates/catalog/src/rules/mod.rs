//! # Compatibility Rule Engine
//!
//! One matcher per anchor category (shower bases, bathtubs, showers, tub
//! showers), plus reverse matchers that let partner-side products be
//! queried from their end. Shared predicates (series matrix, brand/family
//! tables, the nominal-dimension comparator) live in [`predicates`].
//!
//! Matchers never fail: a rule mismatch is an empty result and a missing
//! optional sheet is a skipped category.

pub mod base;
pub mod bathtub;
pub mod predicates;
pub mod reverse;
pub mod shower;
pub mod tub_shower;
pub mod types;

pub use types::{ComboComponent, GroupOutcome, PartnerGroup, PartnerMatch};

use crate::{feed::CatalogSnapshot, feed::FeedProduct, Category};

/// Run the forward matcher for an anchor product. Non-anchor categories
/// yield nothing here; see [`match_reverse`].
pub fn match_anchor(product: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    match product.category {
        Category::ShowerBases => base::match_shower_base(product, snapshot),
        Category::Bathtubs => bathtub::match_bathtub(product, snapshot),
        Category::Showers => shower::match_shower(product, snapshot),
        Category::TubShowers => tub_shower::match_tub_shower(product, snapshot),
        _ => Vec::new(),
    }
}

/// Run the reverse matcher for a partner-side product (doors, walls,
/// screens, enclosures). Anchor categories yield nothing here.
pub fn match_reverse(product: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    reverse::match_partner(product, snapshot)
}

/// Dispatch to the forward or reverse matcher based on the product's
/// category.
pub fn match_any(product: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    if product.category.is_anchor() {
        match_anchor(product, snapshot)
    } else {
        match_reverse(product, snapshot)
    }
}
