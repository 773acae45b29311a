//! Shared matching predicates.

use once_cell::sync::Lazy;
use regex::Regex;

/// Series compatibility matrix.
///
/// Exact (case-insensitive) equality always matches; otherwise the fixed
/// relation applies. A missing series on either side fails.
pub fn series_compatible(base: Option<&str>, other: Option<&str>) -> bool {
    let base = match base.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };
    let other = match other.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };

    if base.eq_ignore_ascii_case(other) {
        return true;
    }

    match base {
        "Retail" => matches!(other, "Retail" | "MAAX"),
        "MAAX" => matches!(other, "Retail" | "MAAX" | "Collection" | "Professional"),
        "Collection" | "Professional" => matches!(other, "MAAX" | "Collection" | "Professional"),
        _ => false,
    }
}

/// Series check used by the bathtub matcher.
///
/// The series restriction was deliberately lifted for bathtubs while every
/// other matcher keeps the matrix; this is carried forward as-is.
pub fn bathtub_series_compatible(_base: Option<&str>, _other: Option<&str>) -> bool {
    true
}

fn norm(value: Option<&str>) -> String {
    value.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

/// Brand/family gate between a shower base and a wall.
///
/// Asymmetric first rule: a maax base only accepts maax walls. After that,
/// a fixed table of brand and family equalities plus the compound family
/// allowances.
pub fn base_wall_brand_family(
    base_brand: Option<&str>,
    base_family: Option<&str>,
    wall_brand: Option<&str>,
    wall_family: Option<&str>,
) -> bool {
    let base_brand = norm(base_brand);
    let base_family = norm(base_family);
    let wall_brand = norm(wall_brand);
    let wall_family = norm(wall_family);

    if base_brand == "maax" && wall_brand != "maax" {
        return false;
    }

    (base_brand == "swan" && wall_brand == "swan")
        || (base_brand == "neptune" && wall_brand == "neptune")
        || (base_brand == "bootz" && wall_brand == "bootz")
        || (base_family == "w&b" && wall_family == "w&b")
        || (base_family == "olio" && wall_family == "olio")
        || (base_family == "vellamo" && wall_family == "vellamo")
        || (base_family == "interflo" && wall_family == "interflo")
        || (base_family == "b3"
            && matches!(wall_family.as_str(), "utile" | "denso" | "nextile" | "versaline"))
        || (matches!(
            base_family.as_str(),
            "finesse" | "distinct" | "zone" | "olympia" | "icon" | "roka"
        ) && matches!(wall_family.as_str(), "utile" | "nextile"))
}

/// Family gate between a bathtub and a wall. Brand rules were dropped for
/// bathtubs; only family restrictions remain.
pub fn bathtub_wall_family(base_family: Option<&str>, wall_family: Option<&str>) -> bool {
    let base_family = norm(base_family);
    let wall_family = norm(wall_family);

    // Olio, Vellamo and Interflo pair strictly within their own family.
    for strict in ["olio", "vellamo", "interflo"] {
        if (base_family == strict) != (wall_family == strict) {
            return false;
        }
    }

    // Utile/Nextile walls are restricted to a fixed set of tub families.
    if matches!(wall_family.as_str(), "utile" | "nextile")
        && !matches!(
            base_family.as_str(),
            "nomad" | "mackenzie" | "exhibit" | "new town" | "rubix" | "bosca" | "cocoon" | "corinthia"
        )
    {
        return false;
    }

    true
}

/// Brand gate between an anchor and a door.
pub fn base_door_brand(base_brand: Option<&str>, door_brand: Option<&str>) -> bool {
    let base_brand = norm(base_brand);
    let door_brand = norm(door_brand);
    if base_brand.is_empty() || door_brand.is_empty() {
        return false;
    }
    (base_brand == "maax" && door_brand == "maax")
        || (base_brand == "neptune" && door_brand == "neptune")
        || (base_brand == "aker" && door_brand == "maax")
}

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)").unwrap());

/// Nominal-dimension equality with format flexibility.
///
/// Handles variations like `"48 x 32"` vs `"48x32"` vs `"48×32"`:
/// whitespace is stripped, the separator set `[xX×*]` is unified, and the
/// token lists are compared pairwise. Numeric tokens match within ±0.5;
/// non-numeric tokens must match exactly.
pub fn nominal_dimensions_match(a: Option<&str>, b: Option<&str>) -> bool {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };

    let a_clean = a.trim().to_lowercase();
    let b_clean = b.trim().to_lowercase();
    if a_clean.is_empty() || b_clean.is_empty() {
        return false;
    }
    if a_clean == b_clean {
        return true;
    }

    let a_std = normalize_dimension_string(&a_clean);
    let b_std = normalize_dimension_string(&b_clean);
    if a_std == b_std {
        return true;
    }

    let a_parts: Vec<&str> = a_std.split('x').collect();
    let b_parts: Vec<&str> = b_std.split('x').collect();
    if a_parts.len() != b_parts.len() || a_parts.len() < 2 {
        return false;
    }

    a_parts.iter().zip(b_parts.iter()).all(|(ta, tb)| {
        match (leading_number(ta), leading_number(tb)) {
            (Some(na), Some(nb)) => (na - nb).abs() <= 0.5,
            _ => ta == tb,
        }
    })
}

fn normalize_dimension_string(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '×' | 'X' | '*' => 'x',
            other => other,
        })
        .collect()
}

fn leading_number(token: &str) -> Option<f64> {
    LEADING_NUMBER
        .captures(token)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// All three values present and `min <= width <= max`.
pub fn width_in_range(width: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    match (width, min, max) {
        (Some(w), Some(lo), Some(hi)) => lo <= w && w <= hi,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_matrix() {
        assert!(series_compatible(Some("Retail"), Some("MAAX")));
        assert!(series_compatible(Some("Retail"), Some("Retail")));
        assert!(!series_compatible(Some("Retail"), Some("Collection")));
        assert!(series_compatible(Some("MAAX"), Some("Collection")));
        assert!(series_compatible(Some("MAAX"), Some("Retail")));
        assert!(series_compatible(Some("Collection"), Some("Professional")));
        assert!(series_compatible(Some("Professional"), Some("MAAX")));
        assert!(!series_compatible(Some("Collection"), Some("Retail")));
        // Exact equality matches even outside the matrix vocabulary.
        assert!(series_compatible(Some("Boutique"), Some("boutique")));
        assert!(!series_compatible(None, Some("MAAX")));
        assert!(!series_compatible(Some("MAAX"), Some("  ")));
    }

    #[test]
    fn bathtub_series_is_always_compatible() {
        assert!(bathtub_series_compatible(Some("Retail"), Some("Collection")));
        assert!(bathtub_series_compatible(None, None));
    }

    #[test]
    fn maax_base_requires_maax_wall() {
        assert!(!base_wall_brand_family(Some("Maax"), Some("B3"), Some("Swan"), Some("Utile")));
        assert!(base_wall_brand_family(Some("Maax"), Some("B3"), Some("Maax"), Some("Utile")));
    }

    #[test]
    fn base_wall_family_table() {
        assert!(base_wall_brand_family(Some("Swan"), None, Some("Swan"), None));
        assert!(base_wall_brand_family(None, Some("Olio"), None, Some("Olio")));
        assert!(base_wall_brand_family(None, Some("B3"), None, Some("Versaline")));
        assert!(base_wall_brand_family(None, Some("Finesse"), None, Some("Nextile")));
        assert!(!base_wall_brand_family(None, Some("Finesse"), None, Some("Versaline")));
        assert!(!base_wall_brand_family(None, Some("Roka"), None, Some("Denso")));
        assert!(base_wall_brand_family(None, Some("Roka"), None, Some("Utile")));
        assert!(!base_wall_brand_family(None, None, None, None));
    }

    #[test]
    fn bathtub_family_strictness() {
        assert!(bathtub_wall_family(Some("Olio"), Some("Olio")));
        assert!(!bathtub_wall_family(Some("Olio"), Some("Utile")));
        assert!(!bathtub_wall_family(Some("Nomad"), Some("Olio")));
        assert!(bathtub_wall_family(Some("Nomad"), Some("Utile")));
        assert!(!bathtub_wall_family(Some("Freestyle"), Some("Nextile")));
        // Permissive outside the restricted families.
        assert!(bathtub_wall_family(Some("Freestyle"), Some("Denso")));
        assert!(bathtub_wall_family(None, None));
    }

    #[test]
    fn door_brand_table() {
        assert!(base_door_brand(Some("Maax"), Some("Maax")));
        assert!(base_door_brand(Some("Aker"), Some("Maax")));
        assert!(!base_door_brand(Some("Maax"), Some("Aker")));
        assert!(base_door_brand(Some("Neptune"), Some("neptune")));
        assert!(!base_door_brand(Some("Swan"), Some("Swan")));
        assert!(!base_door_brand(None, Some("Maax")));
    }

    #[test]
    fn nominal_dimension_variants() {
        assert!(nominal_dimensions_match(Some("48 x 32"), Some("48x32")));
        assert!(nominal_dimensions_match(Some("48*32"), Some("48X32")));
        assert!(nominal_dimensions_match(Some("48×32"), Some("48 x 32")));
        assert!(nominal_dimensions_match(Some(" 48  x  32 "), Some("48x32")));
    }

    #[test]
    fn nominal_dimension_tolerance() {
        assert!(nominal_dimensions_match(Some("48.2 x 32"), Some("48 x 32")));
        assert!(nominal_dimensions_match(Some("47.8 x 31.6"), Some("48 x 32")));
        assert!(!nominal_dimensions_match(Some("49 x 32"), Some("48 x 32")));
        assert!(!nominal_dimensions_match(Some("48 x 33"), Some("48 x 32")));
    }

    #[test]
    fn nominal_dimension_rejects_malformed() {
        assert!(!nominal_dimensions_match(Some("48"), Some("48 x 32")));
        assert!(!nominal_dimensions_match(Some("48 x 32"), Some("unknown")));
        assert!(!nominal_dimensions_match(Some("48 x 32"), None));
        assert!(!nominal_dimensions_match(None, None));
    }

    #[test]
    fn width_window() {
        assert!(width_in_range(Some(45.0), Some(44.0), Some(50.0)));
        assert!(width_in_range(Some(44.0), Some(44.0), Some(50.0)));
        assert!(!width_in_range(Some(43.9), Some(44.0), Some(50.0)));
        assert!(!width_in_range(None, Some(44.0), Some(50.0)));
    }
}
