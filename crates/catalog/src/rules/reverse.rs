//! Reverse matchers: query a partner-side product (door, wall, screen,
//! enclosure) and enumerate the anchors it fits. Each block applies the
//! inverse of the corresponding forward predicate so results stay
//! symmetric with the forward matchers.

use crate::{
    feed::{CatalogSnapshot, FeedProduct},
    rules::predicates::{
        base_door_brand, bathtub_series_compatible, nominal_dimensions_match, series_compatible,
        width_in_range,
    },
    rules::types::{PartnerGroup, PartnerMatch},
    rules::{base, bathtub},
    Category,
};

/// Clearance threshold shared with the forward screen rules, inches.
const SCREEN_CLEARANCE: f64 = 22.0;
/// Enclosure dimensional slack, inches.
const ENCLOSURE_TOLERANCE: f64 = 2.0;

pub fn match_partner(product: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    match product.category {
        Category::TubScreens => bathtubs_for_screen(product, snapshot),
        Category::ShowerScreens => bases_for_screen(product, snapshot),
        Category::ShowerDoors => {
            let mut groups = bases_for_shower_door(product, snapshot);
            groups.extend(showers_for_door(product, snapshot));
            groups
        }
        Category::TubDoors => {
            let mut groups = bathtubs_for_tub_door(product, snapshot);
            groups.extend(tub_showers_for_door(product, snapshot));
            groups
        }
        Category::Walls => {
            let mut groups = Vec::new();
            let wall_type = product.type_field_lower();
            if wall_type.contains("tub") {
                groups.extend(bathtubs_for_wall(product, snapshot));
            }
            if wall_type.contains("shower") {
                groups.extend(bases_for_wall(product, snapshot));
            }
            groups
        }
        Category::Enclosures => bases_for_enclosure(product, snapshot),
        _ => Vec::new(),
    }
}

fn bathtubs_for_screen(screen: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(panel_width) = screen.fixed_panel_width() else {
        return Vec::new();
    };
    let Some(tubs) = snapshot.category(Category::Bathtubs) else {
        return Vec::new();
    };

    let matches: Vec<PartnerMatch> = tubs
        .iter()
        .filter(|tub| match tub.max_door_width() {
            Some(opening) => {
                (opening - panel_width) > SCREEN_CLEARANCE
                    && bathtub_series_compatible(tub.series.as_deref(), screen.series.as_deref())
            }
            None => false,
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::Bathtubs, matches)
}

fn bases_for_screen(screen: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(panel_width) = screen.fixed_panel_width() else {
        return Vec::new();
    };
    let Some(bases) = snapshot.category(Category::ShowerBases) else {
        return Vec::new();
    };

    let matches: Vec<PartnerMatch> = bases
        .iter()
        .filter(|base| {
            let install = base.installation_lower();
            match base.max_door_width() {
                Some(opening) => {
                    (opening - panel_width) > SCREEN_CLEARANCE
                        && series_compatible(base.series.as_deref(), screen.series.as_deref())
                        && (install.contains("alcove") || install.contains("corner"))
                }
                None => false,
            }
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::ShowerBases, matches)
}

fn bases_for_shower_door(door: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(bases) = snapshot.category(Category::ShowerBases) else {
        return Vec::new();
    };

    let matches: Vec<PartnerMatch> = bases
        .iter()
        .filter(|base| {
            let install = base.installation_lower();
            let width_ok = width_in_range(
                base.max_door_width(),
                door.minimum_width(),
                door.maximum_width(),
            );
            let series_ok = series_compatible(base.series.as_deref(), door.series.as_deref());
            let alcove = install.contains("alcove");
            let corner = install.contains("corner") && door.has_return_panel();
            width_ok && series_ok && (alcove || corner)
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::ShowerBases, matches)
}

fn showers_for_door(door: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(showers) = snapshot.category(Category::Showers) else {
        return Vec::new();
    };

    let matches: Vec<PartnerMatch> = showers
        .iter()
        .filter(|shower| {
            let alcove = shower
                .installation()
                .map(|i| i.trim().eq_ignore_ascii_case("alcove"))
                .unwrap_or(false);
            let height_ok = match (door.maximum_height(), shower.max_door_height()) {
                (Some(dh), Some(sh)) => dh <= sh,
                _ => false,
            };
            alcove
                && height_ok
                && width_in_range(shower.max_door_width(), door.minimum_width(), door.maximum_width())
                && series_compatible(shower.series.as_deref(), door.series.as_deref())
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::Showers, matches)
}

fn bathtubs_for_tub_door(door: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(tubs) = snapshot.category(Category::Bathtubs) else {
        return Vec::new();
    };

    let matches: Vec<PartnerMatch> = tubs
        .iter()
        .filter(|tub| {
            let alcove = tub
                .installation()
                .map(|i| i.trim().eq_ignore_ascii_case("alcove"))
                .unwrap_or(false);
            alcove
                && width_in_range(tub.max_door_width(), door.minimum_width(), door.maximum_width())
                && bathtub_series_compatible(tub.series.as_deref(), door.series.as_deref())
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::Bathtubs, matches)
}

fn tub_showers_for_door(door: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(units) = snapshot.category(Category::TubShowers) else {
        return Vec::new();
    };

    let matches: Vec<PartnerMatch> = units
        .iter()
        .filter(|unit| {
            let height_ok = match (door.maximum_height(), unit.max_door_height()) {
                (Some(dh), Some(uh)) => dh <= uh,
                _ => false,
            };
            height_ok
                && width_in_range(unit.max_door_width(), door.minimum_width(), door.maximum_width())
                && series_compatible(unit.series.as_deref(), door.series.as_deref())
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::TubShowers, matches)
}

fn bathtubs_for_wall(wall: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(tubs) = snapshot.category(Category::Bathtubs) else {
        return Vec::new();
    };
    let Some(walls) = snapshot.category(Category::Walls) else {
        return Vec::new();
    };

    // A tub lists this wall only when the wall survives the tub's own
    // selection, per-family closest cut included, so membership in that
    // selection is the predicate here.
    let matches: Vec<PartnerMatch> = tubs
        .iter()
        .filter(|tub| tub.reason_walls_cant_fit().is_none())
        .filter(|tub| {
            bathtub::matching_walls(tub, walls)
                .iter()
                .any(|m| m.sku == wall.sku)
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::Bathtubs, matches)
}

fn bases_for_wall(wall: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(bases) = snapshot.category(Category::ShowerBases) else {
        return Vec::new();
    };
    let Some(walls) = snapshot.category(Category::Walls) else {
        return Vec::new();
    };

    // Same delegation as the bathtub side: the base's selection carries
    // the cut-to-size bound and the closest-cut reduction, so a wall that
    // the forward matcher would drop never lists the base either.
    let matches: Vec<PartnerMatch> = bases
        .iter()
        .filter(|b| b.reason_walls_cant_fit().is_none())
        .filter(|b| {
            base::matching_walls(b, walls)
                .iter()
                .any(|m| m.sku == wall.sku)
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::ShowerBases, matches)
}

fn bases_for_enclosure(enclosure: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let Some(bases) = snapshot.category(Category::ShowerBases) else {
        return Vec::new();
    };

    let matches: Vec<PartnerMatch> = bases
        .iter()
        .filter(|base| {
            if !base.installation_lower().contains("corner") {
                return false;
            }
            if !series_compatible(base.series.as_deref(), enclosure.series.as_deref()) {
                return false;
            }
            if !base_door_brand(base.brand.as_deref(), enclosure.brand.as_deref()) {
                return false;
            }
            let nominal_ok = nominal_dimensions_match(
                base.nominal_dimensions.as_deref(),
                enclosure.nominal_dimensions.as_deref(),
            );
            let dimension_ok = match (
                base.length,
                enclosure.door_width(),
                base.width,
                enclosure.return_panel_width(),
            ) {
                (Some(length), Some(door_width), Some(width), Some(return_width)) => {
                    length >= door_width
                        && (length - door_width) <= ENCLOSURE_TOLERANCE
                        && width >= return_width
                        && (width - return_width) <= ENCLOSURE_TOLERANCE
                }
                _ => false,
            };
            nominal_ok || dimension_ok
        })
        .map(PartnerMatch::from_product)
        .collect();

    group_if_nonempty(Category::ShowerBases, matches)
}

fn group_if_nonempty(category: Category, matches: Vec<PartnerMatch>) -> Vec<PartnerGroup> {
    if matches.is_empty() {
        Vec::new()
    } else {
        vec![PartnerGroup::products(category, matches)]
    }
}
