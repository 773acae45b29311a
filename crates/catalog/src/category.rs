//! Product categories.
//!
//! Category names double as the sheet names of the vendor workbook, so the
//! enum round-trips through the exact display strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Product category enumeration.
///
/// The four anchor categories (shower bases, bathtubs, showers, tub
/// showers) are the ones the rule engine matches from; every other
/// category only appears on the partner side or as a reverse query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Shower Bases")]
    ShowerBases,
    #[serde(rename = "Bathtubs")]
    Bathtubs,
    #[serde(rename = "Showers")]
    Showers,
    #[serde(rename = "Tub Showers")]
    TubShowers,
    #[serde(rename = "Shower Doors")]
    ShowerDoors,
    #[serde(rename = "Tub Doors")]
    TubDoors,
    #[serde(rename = "Shower Screens")]
    ShowerScreens,
    #[serde(rename = "Tub Screens")]
    TubScreens,
    #[serde(rename = "Walls")]
    Walls,
    #[serde(rename = "Return Panels")]
    ReturnPanels,
    #[serde(rename = "Enclosures")]
    Enclosures,
}

impl Category {
    /// Every recognized category, in feed-processing order.
    pub const ALL: [Category; 11] = [
        Category::ShowerBases,
        Category::Bathtubs,
        Category::Showers,
        Category::TubShowers,
        Category::ShowerDoors,
        Category::TubDoors,
        Category::ShowerScreens,
        Category::TubScreens,
        Category::Walls,
        Category::ReturnPanels,
        Category::Enclosures,
    ];

    /// Display name, identical to the workbook sheet name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ShowerBases => "Shower Bases",
            Category::Bathtubs => "Bathtubs",
            Category::Showers => "Showers",
            Category::TubShowers => "Tub Showers",
            Category::ShowerDoors => "Shower Doors",
            Category::TubDoors => "Tub Doors",
            Category::ShowerScreens => "Shower Screens",
            Category::TubScreens => "Tub Screens",
            Category::Walls => "Walls",
            Category::ReturnPanels => "Return Panels",
            Category::Enclosures => "Enclosures",
        }
    }

    /// Resolve a sheet or column value to a category, case-insensitively.
    pub fn from_name(name: &str) -> Option<Category> {
        let trimmed = name.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
    }

    /// Whether this category is matched from by the rule engine.
    pub fn is_anchor(&self) -> bool {
        matches!(
            self,
            Category::ShowerBases | Category::Bathtubs | Category::Showers | Category::TubShowers
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sheet_names() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.as_str()), Some(category));
        }
    }

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(Category::from_name("shower bases"), Some(Category::ShowerBases));
        assert_eq!(Category::from_name(" TUB SHOWERS "), Some(Category::TubShowers));
        assert_eq!(Category::from_name("Widgets"), None);
    }

    #[test]
    fn anchors_are_the_four_installation_categories() {
        let anchors: Vec<Category> = Category::ALL.iter().copied().filter(Category::is_anchor).collect();
        assert_eq!(
            anchors,
            vec![
                Category::ShowerBases,
                Category::Bathtubs,
                Category::Showers,
                Category::TubShowers
            ]
        );
    }

    #[test]
    fn serializes_as_display_name() {
        let json = serde_json::to_string(&Category::ShowerDoors).unwrap();
        assert_eq!(json, "\"Shower Doors\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::ShowerDoors);
    }
}
