//! Projection of stored catalog rows onto the normalized key space.

use super::key::{clean_path, key_from_metadata, key_from_relative, normalize_key};
use super::scope::Scope;
use crate::db::CatalogRow;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// How a catalog row's key was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// The stored path, made relative to the library root.
    StoredPath,
    /// The row's area and title, for rows whose path is missing or lies
    /// outside the root.
    Metadata,
}

/// A catalog row as seen by the diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Catalog ID.
    pub id: i64,
    /// Stored path.
    pub path: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Area label.
    pub area: Option<String>,
    /// Branch that produced the key.
    pub source: KeySource,
}

/// Two catalog rows that produced the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    /// The shared key.
    pub key: String,
    /// Row that stays in the map (the later one).
    pub kept_id: i64,
    /// Row that was shadowed. The diff never schedules it for deletion.
    pub shadowed_id: i64,
}

/// Catalog rows keyed by normalized key.
#[derive(Debug, Clone, Default)]
pub struct CatalogMap {
    /// Key to record, ordered by key.
    pub entries: BTreeMap<String, CatalogRecord>,
    /// Key collisions found while building the map.
    pub duplicates: Vec<DuplicateKey>,
}

impl CatalogMap {
    /// Number of keyed rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no row fell inside the scope.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map stored rows onto keys, keeping only those inside `scope`.
pub fn map_catalog(rows: Vec<CatalogRow>, scope: &Scope) -> CatalogMap {
    let mut map = CatalogMap::default();

    for row in rows {
        let (key, source) = match row.path.as_deref().and_then(|p| stored_path_key(p, &scope.root)) {
            Some(key) => (key, KeySource::StoredPath),
            None => (metadata_key(&row), KeySource::Metadata),
        };

        if !scope.contains_key(&key) {
            continue;
        }

        let id = row.id;
        let record = CatalogRecord {
            id,
            path: row.path,
            title: row.title,
            area: row.area,
            source,
        };

        if let Some(shadowed) = map.entries.insert(key.clone(), record) {
            tracing::warn!(
                key = %key,
                kept = id,
                shadowed = shadowed.id,
                "Catalog rows share a key, keeping the later one"
            );
            map.duplicates.push(DuplicateKey {
                key,
                kept_id: id,
                shadowed_id: shadowed.id,
            });
        }
    }

    map
}

/// Key from a stored path, or `None` if the path is empty or outside the root.
fn stored_path_key(stored: &str, root: &Path) -> Option<String> {
    let stored = stored.trim();
    if stored.is_empty() {
        return None;
    }

    let key = if looks_absolute(stored) {
        let cleaned = clean_path(Path::new(stored));
        key_from_relative(cleaned.strip_prefix(root).ok()?)
    } else {
        // Relative paths are relative to the library root.
        let key = normalize_key(stored);
        if key == ".." || key.starts_with("../") {
            return None;
        }
        key
    };

    (!key.is_empty()).then_some(key)
}

fn metadata_key(row: &CatalogRow) -> String {
    key_from_metadata(
        row.area.as_deref().unwrap_or_default(),
        row.title.as_deref().unwrap_or_default(),
    )
}

/// Absolute on this host, or absolute-looking on another (`C:\`, `\\srv`, `/x`).
fn looks_absolute(path: &str) -> bool {
    if Path::new(path).is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return true;
    }

    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}
