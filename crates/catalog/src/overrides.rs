//! Manual compatibility overrides: whitelist and blacklist pair sets.
//!
//! Each override workbook contributes unordered SKU pairs read from the
//! first two columns of its first sheet. Both sets are lazily loaded on
//! first use, cached process-wide, and only refreshed through an explicit
//! [`OverrideStore::reload`].

use crate::canonical_sku;
use calamine::{open_workbook_auto, Reader};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{error, info};

/// Order-independent pair key.
fn pair_key(a: &str, b: &str) -> (String, String) {
    let a = canonical_sku(a);
    let b = canonical_sku(b);
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

type PairSet = Arc<HashSet<(String, String)>>;

pub struct OverrideStore {
    whitelist_path: PathBuf,
    blacklist_path: PathBuf,
    whitelist: RwLock<Option<PairSet>>,
    blacklist: RwLock<Option<PairSet>>,
}

impl OverrideStore {
    pub fn new(whitelist_path: PathBuf, blacklist_path: PathBuf) -> Self {
        Self {
            whitelist_path,
            blacklist_path,
            whitelist: RwLock::new(None),
            blacklist: RwLock::new(None),
        }
    }

    /// Build a store from literal pair lists. Used by tests and by any
    /// caller that sources overrides elsewhere.
    pub fn from_pairs(
        whitelist: impl IntoIterator<Item = (String, String)>,
        blacklist: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let store = Self::new(PathBuf::new(), PathBuf::new());
        *store.whitelist.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(
            whitelist.into_iter().map(|(a, b)| pair_key(&a, &b)).collect(),
        ));
        *store.blacklist.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(
            blacklist.into_iter().map(|(a, b)| pair_key(&a, &b)).collect(),
        ));
        store
    }

    /// True when the unordered pair `{a, b}` is blacklisted.
    pub fn is_blacklisted(&self, a: &str, b: &str) -> bool {
        if a.trim().is_empty() || b.trim().is_empty() {
            return false;
        }
        self.pairs(&self.blacklist, &self.blacklist_path)
            .contains(&pair_key(a, b))
    }

    /// All counterparties explicitly whitelisted with `sku`.
    pub fn whitelisted_partners_of(&self, sku: &str) -> Vec<String> {
        let canonical = canonical_sku(sku);
        if canonical.is_empty() {
            return Vec::new();
        }
        let mut partners: Vec<String> = self
            .pairs(&self.whitelist, &self.whitelist_path)
            .iter()
            .filter_map(|(a, b)| {
                if *a == canonical {
                    Some(b.clone())
                } else if *b == canonical {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect();
        partners.sort();
        partners.dedup();
        partners
    }

    /// Drop both caches; the next access re-reads the files.
    pub fn reload(&self) {
        *self.whitelist.write().unwrap_or_else(|p| p.into_inner()) = None;
        *self.blacklist.write().unwrap_or_else(|p| p.into_inner()) = None;
        info!("Override caches cleared; next access reloads from disk");
    }

    fn pairs(&self, slot: &RwLock<Option<PairSet>>, path: &Path) -> PairSet {
        if let Some(cached) = slot.read().unwrap_or_else(|p| p.into_inner()).as_ref() {
            return cached.clone();
        }
        let mut guard = slot.write().unwrap_or_else(|p| p.into_inner());
        if let Some(cached) = guard.as_ref() {
            return cached.clone();
        }
        let loaded: PairSet = Arc::new(load_pairs(path));
        *guard = Some(loaded.clone());
        loaded
    }
}

/// Read override pairs from the first two columns of the first sheet.
/// A missing file is an empty set; a malformed file is logged and also
/// treated as empty.
fn load_pairs(path: &Path) -> HashSet<(String, String)> {
    let mut pairs = HashSet::new();

    if path.as_os_str().is_empty() || !path.exists() {
        return pairs;
    }

    let mut workbook = match open_workbook_auto(path) {
        Ok(wb) => wb,
        Err(e) => {
            error!("Error loading override file {}: {}", path.display(), e);
            return pairs;
        }
    };

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return pairs;
    };

    let range = match workbook.worksheet_range(&sheet_name) {
        Ok(range) => range,
        Err(e) => {
            error!("Error reading override sheet in {}: {}", path.display(), e);
            return pairs;
        }
    };

    // First row is a header.
    for row in range.rows().skip(1) {
        let a = row.first().map(|c| c.to_string()).unwrap_or_default();
        let b = row.get(1).map(|c| c.to_string()).unwrap_or_default();
        let a = canonical_sku(&a);
        let b = canonical_sku(&b);
        if !a.is_empty() && !b.is_empty() && a != "NAN" && b != "NAN" {
            pairs.insert(pair_key(&a, &b));
        }
    }

    info!("Loaded {} override pairs from {}", pairs.len(), path.display());
    pairs
}
