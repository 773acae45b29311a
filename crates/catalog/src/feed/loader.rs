//! Workbook parsing for the vendor feed.
//!
//! The feed is a multi-sheet XLSX workbook whose sheet names are the
//! category names. The anchor-installation sheet (`Shower Bases`) is
//! mandatory; any other recognized sheet that is missing only produces a
//! warning and a skipped category. Sheets that are present must carry
//! `Unique ID` and `Product Name` headers.

use crate::{
    error::{CatalogError, Result},
    feed::{record::FeedProduct, snapshot::CatalogSnapshot},
    Category,
};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

pub struct FeedLoader;

impl FeedLoader {
    /// Load the workbook at `path` into a snapshot.
    pub fn load_path(path: &Path) -> Result<CatalogSnapshot> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| CatalogError::InvalidFeed(format!("unreadable workbook {}: {}", path.display(), e)))?;
        Self::build_snapshot(&mut workbook)
    }

    /// Load a workbook from an in-memory byte buffer.
    pub fn load_bytes(bytes: &[u8]) -> Result<CatalogSnapshot> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| CatalogError::InvalidFeed(format!("unreadable workbook: {}", e)))?;
        Self::build_snapshot(&mut workbook)
    }

    fn build_snapshot<RS>(workbook: &mut Sheets<RS>) -> Result<CatalogSnapshot>
    where
        RS: std::io::Read + std::io::Seek,
    {
        let sheet_names = workbook.sheet_names().to_vec();
        debug!("Workbook sheets: {:?}", sheet_names);

        let mut sheets: HashMap<Category, Vec<FeedProduct>> = HashMap::new();

        for name in &sheet_names {
            let Some(category) = Category::from_name(name) else {
                debug!("Ignoring unrecognized sheet '{}'", name);
                continue;
            };

            let range = workbook
                .worksheet_range(name)
                .map_err(|e| CatalogError::InvalidFeed(format!("failed to read sheet '{}': {}", name, e)))?;

            let mut rows = range.rows();
            let Some(header_row) = rows.next() else {
                warn!("Sheet '{}' is empty", name);
                sheets.insert(category, Vec::new());
                continue;
            };

            let headers: Vec<String> = header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect();

            for required in ["Unique ID", "Product Name"] {
                if !headers.iter().any(|h| h == required) {
                    return Err(CatalogError::InvalidFeed(format!(
                        "sheet '{}' is missing the '{}' column",
                        name, required
                    )));
                }
            }

            let mut products = Vec::new();
            for row in rows {
                let cells: Vec<Value> = row.iter().map(cell_to_value).collect();
                if let Some(product) = FeedProduct::from_row(category, &headers, &cells) {
                    products.push(product);
                }
            }

            debug!("Loaded sheet '{}' with {} rows", name, products.len());
            sheets.insert(category, products);
        }

        if !sheets.contains_key(&Category::ShowerBases) {
            return Err(CatalogError::InvalidFeed(
                "workbook is missing the 'Shower Bases' sheet".to_string(),
            ));
        }

        for category in Category::ALL {
            if !sheets.contains_key(&category) {
                warn!("Sheet '{}' absent from feed; category will be skipped", category);
            }
        }

        let snapshot = CatalogSnapshot::new(sheets, Utc::now());
        info!(
            "Feed loaded: {} products across {} sheets",
            snapshot.product_count(),
            snapshot.categories().count()
        );
        Ok(snapshot)
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Int(i) => Value::Number((*i).into()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => serde_json::Number::from_f64(dt.as_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}
