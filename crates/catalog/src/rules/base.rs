//! Shower base matcher: doors (with corner return-panel pairings),
//! enclosures and walls.

use crate::{
    feed::{CatalogSnapshot, FeedProduct},
    rules::predicates::{
        base_door_brand, base_wall_brand_family, nominal_dimensions_match, series_compatible,
        width_in_range,
    },
    rules::types::{PartnerGroup, PartnerMatch},
    Category,
};
use tracing::debug;

/// Dimensional slack for enclosure door/return widths, inches.
const ENCLOSURE_TOLERANCE: f64 = 2.0;
/// How far a cut-to-size wall may exceed the base, inches.
const WALL_TOLERANCE: f64 = 3.0;

pub fn match_shower_base(base: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let install = base.installation_lower();
    let mut groups = Vec::new();

    // ---------- Shower Doors ----------
    if let Some(reason) = base.reason_doors_cant_fit() {
        debug!("Doors incompatibility reason for {}: {}", base.sku, reason);
        groups.push(PartnerGroup::incompatible(Category::ShowerDoors, reason));
    } else if let Some(doors) = snapshot.category(Category::ShowerDoors) {
        let mut matches = Vec::new();
        for door in doors {
            let width_ok = width_in_range(
                base.max_door_width(),
                door.minimum_width(),
                door.maximum_width(),
            );
            if !width_ok || !series_compatible(base.series.as_deref(), door.series.as_deref()) {
                continue;
            }

            if install.contains("alcove") {
                matches.push(PartnerMatch::from_product(door));
            }

            // Corner installs take the door together with a matching
            // return panel: panel size must equal the base's fit size and
            // the panel must share the door's family.
            if install.contains("corner") && door.has_return_panel() {
                if let Some(panels) = snapshot.category(Category::ReturnPanels) {
                    for panel in panels {
                        let size_ok = match (base.fits_return_panel_size(), panel.return_panel_size()) {
                            (Some(a), Some(b)) => a == b,
                            _ => false,
                        };
                        let family_ok = match (door.family.as_deref(), panel.family.as_deref()) {
                            (Some(df), Some(pf)) => df.trim().eq_ignore_ascii_case(pf.trim()),
                            _ => false,
                        };
                        if size_ok && family_ok {
                            matches.push(PartnerMatch::combo(door, panel));
                        }
                    }
                }
            }
        }
        if !matches.is_empty() {
            groups.push(PartnerGroup::products(Category::ShowerDoors, matches));
        }
    }

    // ---------- Enclosures (corner installs only) ----------
    if install.contains("corner") {
        if let Some(enclosures) = snapshot.category(Category::Enclosures) {
            let mut matches = Vec::new();
            for enclosure in enclosures {
                if !series_compatible(base.series.as_deref(), enclosure.series.as_deref()) {
                    continue;
                }
                if !base_door_brand(base.brand.as_deref(), enclosure.brand.as_deref()) {
                    continue;
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

                if nominal_ok || dimension_ok {
                    matches.push(PartnerMatch::from_product(enclosure));
                }
            }
            if !matches.is_empty() {
                groups.push(PartnerGroup::products(Category::Enclosures, matches));
            }
        }
    }

    // ---------- Walls ----------
    if let Some(reason) = base.reason_walls_cant_fit() {
        debug!("Walls incompatibility reason for {}: {}", base.sku, reason);
        groups.push(PartnerGroup::incompatible(Category::Walls, reason));
    } else if let Some(walls) = snapshot.category(Category::Walls) {
        let all_walls = matching_walls(base, walls);
        if !all_walls.is_empty() {
            groups.push(PartnerGroup::products(Category::Walls, all_walls));
        }
    }

    groups
}

/// Walls that fit this base: installation-consistent type, compatible
/// series and brand/family, then either a nominal match (non-trimmable
/// walls) or the bounded cut-to-size candidates reduced to the closest
/// cut. The reverse wall matcher tests membership in this same selection,
/// so both directions agree on the candidate set.
pub(crate) fn matching_walls(base: &FeedProduct, walls: &[FeedProduct]) -> Vec<PartnerMatch> {
    let install = base.installation_lower();
    let mut nominal_matches = Vec::new();
    let mut cut_candidates: Vec<&FeedProduct> = Vec::new();

    for wall in walls {
        let wall_type = wall.type_field_lower();
        let alcove_ok = wall_type.contains("alcove shower") && install.contains("alcove");
        let corner_ok = wall_type.contains("corner shower") && install.contains("corner");
        if !(alcove_ok || corner_ok) {
            continue;
        }
        if !series_compatible(base.series.as_deref(), wall.series.as_deref()) {
            continue;
        }
        if !base_wall_brand_family(
            base.brand.as_deref(),
            base.family.as_deref(),
            wall.brand.as_deref(),
            wall.family.as_deref(),
        ) {
            continue;
        }

        if !wall.cut_to_size() {
            if nominal_dimensions_match(
                base.nominal_dimensions.as_deref(),
                wall.nominal_dimensions.as_deref(),
            ) {
                nominal_matches.push(PartnerMatch::from_product(wall));
            }
        } else if let (Some(base_length), Some(base_width), Some(wall_length), Some(wall_width)) =
            (base.length, base.width, wall.length, wall.width)
        {
            // A trimmable wall must cover the base but not exceed it
            // by more than the tolerance on either axis.
            if wall_length >= base_length
                && wall_length <= base_length + WALL_TOLERANCE
                && wall_width >= base_width
                && wall_width <= base_width + WALL_TOLERANCE
            {
                cut_candidates.push(wall);
            }
        }
    }

    let mut all_walls = nominal_matches;
    all_walls.extend(closest_cut(&cut_candidates));
    all_walls
}

/// Of the qualifying cut-to-size walls, keep only those at the minimum
/// `(length, width)`: smallest length first, then smallest width among
/// those.
fn closest_cut(candidates: &[&FeedProduct]) -> Vec<PartnerMatch> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let min_length = candidates
        .iter()
        .filter_map(|w| w.length)
        .fold(f64::INFINITY, f64::min);
    let min_width = candidates
        .iter()
        .filter(|w| w.length == Some(min_length))
        .filter_map(|w| w.width)
        .fold(f64::INFINITY, f64::min);

    candidates
        .iter()
        .filter(|w| w.length == Some(min_length) && w.width == Some(min_width))
        .map(|w| PartnerMatch::from_product(w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::GroupOutcome;
    use serde_json::json;
    use std::collections::HashMap;

    fn snapshot(products: Vec<FeedProduct>) -> CatalogSnapshot {
        let mut sheets: HashMap<Category, Vec<FeedProduct>> = HashMap::new();
        for p in products {
            sheets.entry(p.category).or_default().push(p);
        }
        CatalogSnapshot::new(sheets, chrono::Utc::now())
    }

    fn alcove_base() -> FeedProduct {
        FeedProduct::new("FB03060M", Category::ShowerBases)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_family("B3")
            .with_nominal("48 x 32")
            .with_dimensions(48.0, 32.0)
            .with_str_attr("Installation", "Alcove")
            .with_num_attr("Max Door Width", 45.0)
    }

    fn door(sku: &str, min: f64, max: f64, series: &str) -> FeedProduct {
        FeedProduct::new(sku, Category::ShowerDoors)
            .with_series(series)
            .with_num_attr("Minimum Width", min)
            .with_num_attr("Maximum Width", max)
    }

    fn group<'a>(groups: &'a [PartnerGroup], category: Category) -> Option<&'a PartnerGroup> {
        groups.iter().find(|g| g.category == category)
    }

    fn skus(group: &PartnerGroup) -> Vec<&str> {
        group
            .product_list()
            .unwrap()
            .iter()
            .map(|p| p.sku.as_str())
            .collect()
    }

    #[test]
    fn alcove_base_matches_door_in_width_window() {
        let base = alcove_base();
        let snap = snapshot(vec![door("D1", 44.0, 50.0, "Collection")]);
        let groups = match_shower_base(&base, &snap);
        let doors = group(&groups, Category::ShowerDoors).expect("doors group");
        assert_eq!(skus(doors), vec!["D1"]);
    }

    #[test]
    fn door_outside_width_window_is_rejected() {
        let base = alcove_base();
        let snap = snapshot(vec![door("D1", 46.0, 50.0, "MAAX")]);
        assert!(match_shower_base(&base, &snap).is_empty());
    }

    #[test]
    fn series_mismatch_rejects_door() {
        let mut base = alcove_base();
        base.series = Some("Retail".to_string());
        let snap = snapshot(vec![door("D1", 44.0, 50.0, "Collection")]);
        assert!(match_shower_base(&base, &snap).is_empty());
    }

    #[test]
    fn doors_reason_suppresses_door_matching() {
        let base = alcove_base().with_str_attr("Reason Doors Can't Fit", "Panels exceed alcove width");
        let snap = snapshot(vec![door("D1", 44.0, 50.0, "MAAX")]);
        let groups = match_shower_base(&base, &snap);
        let doors = group(&groups, Category::ShowerDoors).unwrap();
        assert_eq!(
            doors.outcome,
            GroupOutcome::Incompatible("Panels exceed alcove width".to_string())
        );
    }

    #[test]
    fn corner_base_pairs_return_panel_by_size_and_family() {
        let base = FeedProduct::new("B2", Category::ShowerBases)
            .with_series("MAAX")
            .with_dimensions(48.0, 34.0)
            .with_str_attr("Installation", "Corner")
            .with_num_attr("Max Door Width", 45.0)
            .with_str_attr("Fits Return Panel Size", "36");
        let corner_door = door("D2", 44.0, 50.0, "MAAX")
            .with_family("F")
            .with_str_attr("Has Return Panel", "Yes");
        let panel_fit = FeedProduct::new("P1", Category::ReturnPanels)
            .with_family("F")
            .with_str_attr("Return Panel Size", "36");
        let panel_wrong_size = FeedProduct::new("P2", Category::ReturnPanels)
            .with_family("F")
            .with_str_attr("Return Panel Size", "42");

        let snap = snapshot(vec![corner_door, panel_fit, panel_wrong_size]);
        let groups = match_shower_base(&base, &snap);
        let doors = group(&groups, Category::ShowerDoors).unwrap();
        let listed = skus(doors);
        assert!(listed.contains(&"D2|P1"));
        assert!(!listed.contains(&"D2|P2"));
    }

    #[test]
    fn enclosure_requires_corner_and_tolerances() {
        let base = FeedProduct::new("B3", Category::ShowerBases)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_dimensions(48.0, 34.0)
            .with_str_attr("Installation", "Corner");
        let fits = FeedProduct::new("E1", Category::Enclosures)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_num_attr("Door Width", 48.0)
            .with_num_attr("Return Panel Width", 33.0);
        let too_wide = FeedProduct::new("E2", Category::Enclosures)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_num_attr("Door Width", 49.0)
            .with_num_attr("Return Panel Width", 33.0);
        let wrong_brand = FeedProduct::new("E3", Category::Enclosures)
            .with_brand("Swan")
            .with_series("MAAX")
            .with_num_attr("Door Width", 48.0)
            .with_num_attr("Return Panel Width", 33.0);

        let snap = snapshot(vec![fits, too_wide, wrong_brand]);
        let groups = match_shower_base(&base, &snap);
        let enclosures = group(&groups, Category::Enclosures).unwrap();
        assert_eq!(skus(enclosures), vec!["E1"]);
    }

    #[test]
    fn enclosures_skipped_for_alcove_installs() {
        let base = alcove_base();
        let snap = snapshot(vec![FeedProduct::new("E1", Category::Enclosures)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_num_attr("Door Width", 48.0)
            .with_num_attr("Return Panel Width", 31.0)]);
        assert!(group(&match_shower_base(&base, &snap), Category::Enclosures).is_none());
    }

    fn cut_wall(sku: &str, length: f64, width: f64) -> FeedProduct {
        FeedProduct::new(sku, Category::Walls)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_family("Utile")
            .with_dimensions(length, width)
            .with_str_attr("Type", "Alcove Shower Wall")
            .with_str_attr("Cut to Size", "Yes")
    }

    #[test]
    fn cut_wall_bound_is_three_inches() {
        let base = alcove_base();
        let exact = cut_wall("W_EXACT", 48.0, 32.0);
        let at_bound = cut_wall("W_BOUND", 51.0, 35.0);
        let over = cut_wall("W_OVER", 51.01, 32.0);

        let snap = snapshot(vec![exact.clone(), over]);
        let groups = match_shower_base(&base, &snap);
        assert_eq!(skus(group(&groups, Category::Walls).unwrap()), vec!["W_EXACT"]);

        // With only the +3 wall present it qualifies.
        let snap = snapshot(vec![at_bound]);
        let groups = match_shower_base(&base, &snap);
        assert_eq!(skus(group(&groups, Category::Walls).unwrap()), vec!["W_BOUND"]);
    }

    #[test]
    fn closest_cut_is_lexicographic_min() {
        let base = alcove_base();
        let snap = snapshot(vec![
            cut_wall("W_50_33", 50.0, 33.0),
            cut_wall("W_49_34", 49.0, 34.0),
            cut_wall("W_49_33", 49.0, 33.0),
            cut_wall("W_49_33_B", 49.0, 33.0),
        ]);
        let groups = match_shower_base(&base, &snap);
        let listed = skus(group(&groups, Category::Walls).unwrap());
        assert_eq!(listed, vec!["W_49_33", "W_49_33_B"]);
    }

    #[test]
    fn nominal_wall_requires_not_cut_to_size() {
        let base = alcove_base();
        let nominal_wall = FeedProduct::new("W_NOM", Category::Walls)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_family("Utile")
            .with_nominal("48x32")
            .with_str_attr("Type", "Alcove Shower Wall");
        let cut_nominal = FeedProduct::new("W_CUTNOM", Category::Walls)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_family("Utile")
            .with_nominal("48x32")
            .with_str_attr("Type", "Alcove Shower Wall")
            .with_str_attr("Cut to Size", "Yes");
        let snap = snapshot(vec![nominal_wall, cut_nominal]);
        let groups = match_shower_base(&base, &snap);
        // The cut wall has no Length/Width, so only the nominal match lands.
        assert_eq!(skus(group(&groups, Category::Walls).unwrap()), vec!["W_NOM"]);
    }

    #[test]
    fn wall_type_must_match_installation() {
        let base = alcove_base();
        let corner_wall = FeedProduct::new("W_CORNER", Category::Walls)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_family("Utile")
            .with_nominal("48x32")
            .with_str_attr("Type", "Corner Shower Wall");
        let snap = snapshot(vec![corner_wall]);
        assert!(group(&match_shower_base(&base, &snap), Category::Walls).is_none());
    }

    #[test]
    fn walls_ordered_by_ranking() {
        let base = alcove_base();
        let first = FeedProduct::new("W_SECOND", Category::Walls)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_family("Utile")
            .with_nominal("48x32")
            .with_ranking(20.0)
            .with_str_attr("Type", "Alcove Shower Wall");
        let second = FeedProduct::new("W_FIRST", Category::Walls)
            .with_brand("Maax")
            .with_series("MAAX")
            .with_family("Utile")
            .with_nominal("48x32")
            .with_ranking(5.0)
            .with_str_attr("Type", "Alcove Shower Wall");
        let snap = snapshot(vec![first, second]);
        let groups = match_shower_base(&base, &snap);
        assert_eq!(skus(group(&groups, Category::Walls).unwrap()), vec!["W_FIRST", "W_SECOND"]);
    }

    #[test]
    fn attributes_reason_does_not_block_other_categories() {
        let base = alcove_base().with_str_attr("Reason Walls Can't Fit", "No flat mounting surface");
        let snap = snapshot(vec![
            door("D1", 44.0, 50.0, "MAAX"),
            FeedProduct::new("W1", Category::Walls)
                .with_brand("Maax")
                .with_series("MAAX")
                .with_family("Utile")
                .with_nominal("48x32")
                .with_str_attr("Type", "Alcove Shower Wall"),
        ]);
        let groups = match_shower_base(&base, &snap);
        assert!(group(&groups, Category::ShowerDoors).unwrap().product_list().is_some());
        let walls = group(&groups, Category::Walls).unwrap();
        assert_eq!(walls.incompatibility_reason(), Some("No flat mounting surface"));
    }

    #[test]
    fn missing_sheets_are_skipped_silently() {
        let base = alcove_base();
        let snap = snapshot(vec![json_free_marker()]);
        assert!(match_shower_base(&base, &snap).is_empty());
    }

    // A product in an unrelated sheet, to keep the snapshot non-empty.
    fn json_free_marker() -> FeedProduct {
        FeedProduct::new("X", Category::TubScreens).with_attr("Fixed Panel Width", json!(20.0))
    }
}
