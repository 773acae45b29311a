//! Bathtub matcher: tub doors, tub screens and walls.
//!
//! Output category order is fixed: Tub Doors, Tub Screens, Walls.

use crate::{
    feed::{CatalogSnapshot, FeedProduct},
    rules::predicates::{
        bathtub_series_compatible, bathtub_wall_family, nominal_dimensions_match, width_in_range,
    },
    rules::types::{PartnerGroup, PartnerMatch},
    Category,
};
use std::collections::BTreeMap;
use tracing::debug;

/// A tub screen leaves enough entry space when the tub's door opening
/// exceeds the screen's fixed panel by more than this, inches.
const SCREEN_CLEARANCE: f64 = 22.0;

pub fn match_bathtub(tub: &FeedProduct, snapshot: &CatalogSnapshot) -> Vec<PartnerGroup> {
    let doors_reason = tub.reason_doors_cant_fit();
    let walls_reason = tub.reason_walls_cant_fit();
    let alcove = tub
        .installation()
        .map(|i| i.trim().eq_ignore_ascii_case("alcove"))
        .unwrap_or(false);

    let mut groups = Vec::new();

    // ---------- Tub Doors ----------
    if let Some(reason) = doors_reason.clone() {
        debug!("Tub doors incompatibility reason for {}: {}", tub.sku, reason);
        groups.push(PartnerGroup::incompatible(Category::TubDoors, reason));
    } else if let Some(doors) = snapshot.category(Category::TubDoors) {
        let mut matches = Vec::new();
        for door in doors {
            if alcove
                && width_in_range(tub.max_door_width(), door.minimum_width(), door.maximum_width())
                && bathtub_series_compatible(tub.series.as_deref(), door.series.as_deref())
            {
                matches.push(PartnerMatch::from_product(door));
            }
        }
        if !matches.is_empty() {
            groups.push(PartnerGroup::products(Category::TubDoors, matches));
        }
    }

    // ---------- Tub Screens ----------
    // A door annotation suppresses screens as well.
    if doors_reason.is_none() {
        if let Some(screens) = snapshot.category(Category::TubScreens) {
            let mut matches = Vec::new();
            for screen in screens {
                let clearance_ok = match (tub.max_door_width(), screen.fixed_panel_width()) {
                    (Some(opening), Some(panel)) => (opening - panel) > SCREEN_CLEARANCE,
                    _ => false,
                };
                if alcove
                    && clearance_ok
                    && bathtub_series_compatible(tub.series.as_deref(), screen.series.as_deref())
                {
                    matches.push(PartnerMatch::from_product(screen));
                }
            }
            if !matches.is_empty() {
                groups.push(PartnerGroup::products(Category::TubScreens, matches));
            }
        }
    }

    // ---------- Walls ----------
    if let Some(reason) = walls_reason {
        debug!("Walls incompatibility reason for {}: {}", tub.sku, reason);
        groups.push(PartnerGroup::incompatible(Category::Walls, reason));
    } else if let Some(walls) = snapshot.category(Category::Walls) {
        let matches = matching_walls(tub, walls);
        if !matches.is_empty() {
            groups.push(PartnerGroup::products(Category::Walls, matches));
        }
    }

    groups
}

/// Walls that fit this tub: tub-type walls passing the family rules, via
/// a nominal match for non-trimmable walls or the per-family closest-cut
/// selection for cut-to-size ones. The reverse wall matcher tests
/// membership in this same selection, so both directions agree on the
/// candidate set.
pub(crate) fn matching_walls(tub: &FeedProduct, walls: &[FeedProduct]) -> Vec<PartnerMatch> {
    let mut matches = Vec::new();
    let mut cut_candidates: Vec<&FeedProduct> = Vec::new();

    for wall in walls {
        if !wall.type_field_lower().contains("tub") {
            continue;
        }
        if !bathtub_series_compatible(tub.series.as_deref(), wall.series.as_deref()) {
            continue;
        }
        if !bathtub_wall_family(tub.family.as_deref(), wall.family.as_deref()) {
            continue;
        }

        if !wall.cut_to_size() {
            if nominal_dimensions_match(
                tub.nominal_dimensions.as_deref(),
                wall.nominal_dimensions.as_deref(),
            ) {
                matches.push(PartnerMatch::from_product(wall));
            }
        } else if let (Some(tub_length), Some(tub_width), Some(wall_length), Some(wall_width)) =
            (tub.length, tub.width, wall.length, wall.width)
        {
            if wall_length >= tub_length && wall_width >= tub_width {
                cut_candidates.push(wall);
            }
        }
    }

    matches.extend(closest_cut_per_family(tub, &cut_candidates));
    matches
}

/// Per family, keep the cut-to-size walls closest to the tub by Manhattan
/// distance. Ties within a family are all retained.
fn closest_cut_per_family(tub: &FeedProduct, candidates: &[&FeedProduct]) -> Vec<PartnerMatch> {
    let (Some(tub_length), Some(tub_width)) = (tub.length, tub.width) else {
        return Vec::new();
    };

    let mut by_family: BTreeMap<String, Vec<&FeedProduct>> = BTreeMap::new();
    for wall in candidates {
        let family = wall
            .family
            .as_deref()
            .map(|f| f.trim().to_lowercase())
            .unwrap_or_default();
        by_family.entry(family).or_default().push(wall);
    }

    let mut kept = Vec::new();
    for walls in by_family.values() {
        let distance = |w: &FeedProduct| {
            (w.length.unwrap_or(f64::INFINITY) - tub_length).abs()
                + (w.width.unwrap_or(f64::INFINITY) - tub_width).abs()
        };
        let min_distance = walls
            .iter()
            .map(|w| distance(w))
            .fold(f64::INFINITY, f64::min);
        for wall in walls {
            if distance(wall) == min_distance {
                kept.push(PartnerMatch::from_product(wall));
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot(products: Vec<FeedProduct>) -> CatalogSnapshot {
        let mut sheets: HashMap<Category, Vec<FeedProduct>> = HashMap::new();
        for p in products {
            sheets.entry(p.category).or_default().push(p);
        }
        CatalogSnapshot::new(sheets, chrono::Utc::now())
    }

    fn olio_tub() -> FeedProduct {
        FeedProduct::new("T1", Category::Bathtubs)
            .with_family("Olio")
            .with_series("Retail")
            .with_nominal("60 x 32")
            .with_dimensions(60.0, 32.0)
            .with_str_attr("Installation", "Alcove")
            .with_num_attr("Max Door Width", 58.0)
    }

    fn tub_wall(sku: &str, family: &str, nominal: &str) -> FeedProduct {
        FeedProduct::new(sku, Category::Walls)
            .with_family(family)
            .with_nominal(nominal)
            .with_str_attr("Type", "Tub Wall")
    }

    fn categories(groups: &[PartnerGroup]) -> Vec<Category> {
        groups.iter().map(|g| g.category).collect()
    }

    fn wall_skus(groups: &[PartnerGroup]) -> Vec<String> {
        groups
            .iter()
            .find(|g| g.category == Category::Walls)
            .and_then(|g| g.product_list())
            .map(|list| list.iter().map(|p| p.sku.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn olio_strictness_and_cut_to_size_walls() {
        // W1 nominal Olio kept, W2 Utile blocked by Olio strictness,
        // W3 Olio cut-to-size admitted as the family's closest cut.
        let tub = olio_tub();
        let w1 = tub_wall("W1", "Olio", "60 x 32");
        let w2 = tub_wall("W2", "Utile", "60 x 32");
        let w3 = tub_wall("W3", "Olio", "72 x 34")
            .with_dimensions(72.0, 34.0)
            .with_str_attr("Cut to Size", "Yes");
        let snap = snapshot(vec![w1, w2, w3]);

        let groups = match_bathtub(&tub, &snap);
        assert_eq!(wall_skus(&groups), vec!["W1", "W3"]);
    }

    #[test]
    fn manhattan_ties_within_family_are_all_kept() {
        let tub = olio_tub();
        // Both are distance 14 from 60x32; the 74x34 wall is distance 16.
        let near_a = tub_wall("W_A", "Olio", "72 x 34")
            .with_dimensions(72.0, 34.0)
            .with_str_attr("Cut to Size", "Yes");
        let near_b = tub_wall("W_B", "Olio", "70 x 36")
            .with_dimensions(70.0, 36.0)
            .with_str_attr("Cut to Size", "Yes");
        let far = tub_wall("W_C", "Olio", "74 x 34")
            .with_dimensions(74.0, 34.0)
            .with_str_attr("Cut to Size", "Yes");
        let snap = snapshot(vec![near_a, near_b, far]);

        let groups = match_bathtub(&tub, &snap);
        let mut listed = wall_skus(&groups);
        listed.sort();
        assert_eq!(listed, vec!["W_A", "W_B"]);
    }

    #[test]
    fn cut_walls_smaller_than_tub_are_rejected() {
        let tub = olio_tub();
        let small = tub_wall("W_SMALL", "Olio", "58 x 32")
            .with_dimensions(58.0, 32.0)
            .with_str_attr("Cut to Size", "Yes");
        let snap = snapshot(vec![small]);
        assert!(wall_skus(&match_bathtub(&tub, &snap)).is_empty());
    }

    #[test]
    fn screen_clearance_boundary() {
        let tub = olio_tub(); // Max Door Width 58
        let at_limit = FeedProduct::new("S_22", Category::TubScreens)
            .with_num_attr("Fixed Panel Width", 36.0); // 58 - 36 = 22 exactly
        let over_limit = FeedProduct::new("S_OK", Category::TubScreens)
            .with_num_attr("Fixed Panel Width", 35.99); // 22.01
        let snap = snapshot(vec![at_limit, over_limit]);

        let groups = match_bathtub(&tub, &snap);
        let screens: Vec<String> = groups
            .iter()
            .find(|g| g.category == Category::TubScreens)
            .and_then(|g| g.product_list())
            .map(|list| list.iter().map(|p| p.sku.clone()).collect())
            .unwrap_or_default();
        assert_eq!(screens, vec!["S_OK"]);
    }

    #[test]
    fn series_is_permissive_for_tub_doors() {
        let tub = olio_tub();
        let door = FeedProduct::new("TD1", Category::TubDoors)
            .with_series("Collection") // would fail the matrix against Retail
            .with_num_attr("Minimum Width", 55.0)
            .with_num_attr("Maximum Width", 60.0)
            .with_str_attr("Installation", "Alcove");
        let snap = snapshot(vec![door]);
        let groups = match_bathtub(&tub, &snap);
        assert_eq!(categories(&groups), vec![Category::TubDoors]);
    }

    #[test]
    fn door_reason_suppresses_doors_and_screens() {
        let tub = olio_tub().with_str_attr("Reason Doors Can't Fit", "Rim too narrow");
        let door = FeedProduct::new("TD1", Category::TubDoors)
            .with_num_attr("Minimum Width", 55.0)
            .with_num_attr("Maximum Width", 60.0);
        let screen = FeedProduct::new("S1", Category::TubScreens)
            .with_num_attr("Fixed Panel Width", 30.0);
        let snap = snapshot(vec![door, screen]);

        let groups = match_bathtub(&tub, &snap);
        assert_eq!(categories(&groups), vec![Category::TubDoors]);
        assert_eq!(groups[0].incompatibility_reason(), Some("Rim too narrow"));
    }

    #[test]
    fn category_order_is_doors_screens_walls() {
        let tub = olio_tub();
        let door = FeedProduct::new("TD1", Category::TubDoors)
            .with_num_attr("Minimum Width", 55.0)
            .with_num_attr("Maximum Width", 60.0);
        let screen = FeedProduct::new("S1", Category::TubScreens)
            .with_num_attr("Fixed Panel Width", 30.0);
        let wall = tub_wall("W1", "Olio", "60 x 32");
        let snap = snapshot(vec![wall, screen, door]);

        let groups = match_bathtub(&tub, &snap);
        assert_eq!(
            categories(&groups),
            vec![Category::TubDoors, Category::TubScreens, Category::Walls]
        );
    }

    #[test]
    fn non_alcove_tub_matches_no_doors() {
        let mut tub = olio_tub();
        tub.attributes.insert(
            "Installation".to_string(),
            serde_json::Value::String("Drop-in".to_string()),
        );
        let door = FeedProduct::new("TD1", Category::TubDoors)
            .with_num_attr("Minimum Width", 55.0)
            .with_num_attr("Maximum Width", 60.0);
        let snap = snapshot(vec![door]);
        assert!(match_bathtub(&tub, &snap).is_empty());
    }
}
