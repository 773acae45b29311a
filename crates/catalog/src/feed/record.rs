//! In-memory product records parsed from the vendor workbook.

use crate::{canonical_sku, Category};
use serde_json::Value;
use std::collections::BTreeMap;

/// Columns mapped onto dedicated fields. Everything else is preserved
/// verbatim in `attributes` so unknown columns survive a round trip.
pub const CLASSIFIED_COLUMNS: [&str; 12] = [
    "Unique ID",
    "Product Name",
    "Brand",
    "Series",
    "Family",
    "Length",
    "Width",
    "Height",
    "Nominal Dimensions",
    "Product Page URL",
    "Image URL",
    "Ranking",
];

/// One row of a feed sheet, with classified columns promoted to typed
/// fields and the rest kept in an attribute bag.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedProduct {
    pub sku: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub series: Option<String>,
    pub family: Option<String>,
    pub category: Category,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub nominal_dimensions: Option<String>,
    pub ranking: Option<f64>,
    pub product_page_url: Option<String>,
    pub image_url: Option<String>,
    pub attributes: BTreeMap<String, Value>,
}

impl FeedProduct {
    pub fn new(sku: impl Into<String>, category: Category) -> Self {
        Self {
            sku: canonical_sku(&sku.into()),
            name: None,
            brand: None,
            series: None,
            family: None,
            category,
            length: None,
            width: None,
            height: None,
            nominal_dimensions: None,
            ranking: None,
            product_page_url: None,
            image_url: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Build a record from a header row and a data row. Returns `None`
    /// when the row carries no usable SKU.
    pub fn from_row(category: Category, headers: &[String], cells: &[Value]) -> Option<Self> {
        let mut record = FeedProduct::new(String::new(), category);

        for (header, cell) in headers.iter().zip(cells.iter()) {
            if cell.is_null() {
                continue;
            }
            match header.as_str() {
                "Unique ID" => {
                    if let Some(s) = value_to_string(cell) {
                        record.sku = canonical_sku(&s);
                    }
                }
                "Product Name" => record.name = value_to_string(cell),
                "Brand" => record.brand = value_to_string(cell),
                "Series" => record.series = value_to_string(cell),
                "Family" => record.family = value_to_string(cell),
                "Length" => record.length = value_to_number(cell),
                "Width" => record.width = value_to_number(cell),
                "Height" => record.height = value_to_number(cell),
                "Nominal Dimensions" => record.nominal_dimensions = value_to_string(cell),
                "Product Page URL" => record.product_page_url = value_to_string(cell),
                "Image URL" => record.image_url = value_to_string(cell),
                "Ranking" => record.ranking = value_to_number(cell),
                _ => {
                    record.attributes.insert(header.clone(), cell.clone());
                }
            }
        }

        if record.sku.is_empty() || record.sku == "NAN" {
            return None;
        }
        Some(record)
    }

    /// Sort key for partner ordering: the ranking column, 999 when absent.
    pub fn rank(&self) -> f64 {
        self.ranking.unwrap_or(999.0)
    }

    pub fn attr_string(&self, key: &str) -> Option<String> {
        self.attributes.get(key).and_then(value_to_string)
    }

    pub fn attr_number(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(value_to_number)
    }

    pub fn installation(&self) -> Option<String> {
        self.attr_string("Installation")
    }

    /// Lower-cased installation string, empty when absent. Installation
    /// matching is substring-based ("alcove" / "corner").
    pub fn installation_lower(&self) -> String {
        self.installation().unwrap_or_default().to_lowercase()
    }

    pub fn max_door_width(&self) -> Option<f64> {
        self.attr_number("Max Door Width")
    }

    pub fn max_door_height(&self) -> Option<f64> {
        self.attr_number("Max Door Height")
    }

    pub fn minimum_width(&self) -> Option<f64> {
        self.attr_number("Minimum Width")
    }

    pub fn maximum_width(&self) -> Option<f64> {
        self.attr_number("Maximum Width")
    }

    pub fn maximum_height(&self) -> Option<f64> {
        self.attr_number("Maximum Height")
    }

    pub fn fixed_panel_width(&self) -> Option<f64> {
        self.attr_number("Fixed Panel Width")
    }

    pub fn door_width(&self) -> Option<f64> {
        self.attr_number("Door Width")
    }

    pub fn return_panel_width(&self) -> Option<f64> {
        self.attr_number("Return Panel Width")
    }

    pub fn has_return_panel(&self) -> bool {
        self.attr_string("Has Return Panel")
            .map(|v| v.eq_ignore_ascii_case("yes"))
            .unwrap_or(false)
    }

    pub fn cut_to_size(&self) -> bool {
        self.attr_string("Cut to Size")
            .map(|v| v.eq_ignore_ascii_case("yes"))
            .unwrap_or(false)
    }

    pub fn fits_return_panel_size(&self) -> Option<String> {
        self.attr_string("Fits Return Panel Size")
    }

    pub fn return_panel_size(&self) -> Option<String> {
        self.attr_string("Return Panel Size")
    }

    /// The descriptive `Type` column ("alcove shower wall", "tub", ...).
    pub fn type_field(&self) -> Option<String> {
        self.attr_string("Type")
    }

    pub fn type_field_lower(&self) -> String {
        self.type_field().unwrap_or_default().to_lowercase()
    }

    pub fn glass_thickness(&self) -> Option<String> {
        self.attr_string("Glass Thickness")
            .or_else(|| self.attr_string("Glass"))
    }

    // The feed has carried a double-spaced variant of this header.
    pub fn door_type(&self) -> Option<String> {
        self.attr_string("Door Type")
            .or_else(|| self.attr_string("Door  Type"))
            .or_else(|| self.attr_string("Type"))
    }

    pub fn material(&self) -> Option<String> {
        self.attr_string("Material")
    }

    pub fn reason_doors_cant_fit(&self) -> Option<String> {
        self.attr_string("Reason Doors Can't Fit")
    }

    pub fn reason_walls_cant_fit(&self) -> Option<String> {
        self.attr_string("Reason Walls Can't Fit")
    }

    // Builder-style helpers, used heavily by tests and the whitelist path.

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_brand(mut self, brand: &str) -> Self {
        self.brand = Some(brand.to_string());
        self
    }

    pub fn with_series(mut self, series: &str) -> Self {
        self.series = Some(series.to_string());
        self
    }

    pub fn with_family(mut self, family: &str) -> Self {
        self.family = Some(family.to_string());
        self
    }

    pub fn with_dimensions(mut self, length: f64, width: f64) -> Self {
        self.length = Some(length);
        self.width = Some(width);
        self
    }

    pub fn with_nominal(mut self, nominal: &str) -> Self {
        self.nominal_dimensions = Some(nominal.to_string());
        self
    }

    pub fn with_ranking(mut self, ranking: f64) -> Self {
        self.ranking = Some(ranking);
        self
    }

    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_str_attr(self, key: &str, value: &str) -> Self {
        self.with_attr(key, Value::String(value.to_string()))
    }

    pub fn with_num_attr(self, key: &str, value: f64) -> Self {
        match serde_json::Number::from_f64(value) {
            Some(n) => self.with_attr(key, Value::Number(n)),
            None => self,
        }
    }
}

/// Normalize a JSON value to a trimmed, non-empty string. Whole numbers
/// render without a trailing `.0` so that `36` and `"36"` compare equal
/// for size fields.
pub fn value_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            } else {
                n.to_string()
            }
        }
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Lenient decimal coercion: numbers pass through, parseable strings are
/// parsed, anything else is treated as absent.
pub fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
