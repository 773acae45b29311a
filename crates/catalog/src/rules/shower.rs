//! Shower matcher: doors sized to the unit's opening.

use crate::{
    feed::{CatalogSnapshot, FeedProduct},
    rules::predicates::{series_compatible, width_in_range},
    rules::types::{PartnerGroup, PartnerMatch},
    Category,
};
use tracing::debug;

pub fn match_shower(shower: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let mut groups = Vec::new();

    if let Some(reason) = shower.reason_doors_cant_fit() {
        debug!("Shower doors incompatibility reason for {}: {}", shower.sku, reason);
        groups.push(PartnerGroup::incompatible(Category::ShowerDoors, reason));
        return groups;
    }

    let Some(doors) = snapshot.category(Category::ShowerDoors) else {
        return groups;
    };

    let alcove = shower
        .installation()
        .map(|i| i.trim().eq_ignore_ascii_case("alcove"))
        .unwrap_or(false);

    let mut matches = Vec::new();
    for door in doors {
        let height_ok = match (door.maximum_height(), shower.max_door_height()) {
            (Some(door_height), Some(opening_height)) => door_height <= opening_height,
            _ => false,
        };
        if alcove
            && height_ok
            && width_in_range(shower.max_door_width(), door.minimum_width(), door.maximum_width())
            && series_compatible(shower.series.as_deref(), door.series.as_deref())
        {
            matches.push(PartnerMatch::from_product(door));
        }
    }

    if !matches.is_empty() {
        groups.push(PartnerGroup::products(Category::ShowerDoors, matches));
    }
    groups
}
