//! Tub shower matcher: tub doors sized to the unit's opening. Unlike
//! showers there is no installation gate; every tub shower takes a door.

use crate::{
    feed::{CatalogSnapshot, FeedProduct},
    rules::predicates::{series_compatible, width_in_range},
    rules::types::{PartnerGroup, PartnerMatch},
    Category,
};
use tracing::debug;

pub fn match_tub_shower(unit: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let mut groups = Vec::new();

    if let Some(reason) = unit.reason_doors_cant_fit() {
        debug!("Tub doors incompatibility reason for {}: {}", unit.sku, reason);
        groups.push(PartnerGroup::incompatible(Category::TubDoors, reason));
        return groups;
    }

    let Some(doors) = snapshot.category(Category::TubDoors) else {
        return groups;
    };

    let mut matches = Vec::new();
    for door in doors {
        let height_ok = match (door.maximum_height(), unit.max_door_height()) {
            (Some(door_height), Some(opening_height)) => door_height <= opening_height,
            _ => false,
        };
        if height_ok
            && width_in_range(unit.max_door_width(), door.minimum_width(), door.maximum_width())
            && series_compatible(unit.series.as_deref(), door.series.as_deref())
        {
            matches.push(PartnerMatch::from_product(door));
        }
    }

    if !matches.is_empty() {
        groups.push(PartnerGroup::products(Category::TubDoors, matches));
    }
    groups
}
