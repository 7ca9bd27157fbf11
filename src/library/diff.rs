//! Key set differences between the folder and the catalog.

use std::collections::{BTreeMap, BTreeSet};

/// Pending changes. The folder is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    /// Catalog keys with no file on disk.
    pub to_delete: BTreeSet<String>,
    /// File keys with no catalog row.
    pub to_insert: BTreeSet<String>,
}

impl KeyDiff {
    /// True when folder and catalog already agree.
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty()
    }
}

/// Compute `catalog - scan` and `scan - catalog` over the map keys.
pub fn diff_keys<S, C>(scan: &BTreeMap<String, S>, catalog: &BTreeMap<String, C>) -> KeyDiff {
    let to_delete = catalog
        .keys()
        .filter(|key| !scan.contains_key(*key))
        .cloned()
        .collect();

    let to_insert = scan
        .keys()
        .filter(|key| !catalog.contains_key(*key))
        .cloned()
        .collect();

    KeyDiff {
        to_delete,
        to_insert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(keys: &[&str]) -> BTreeMap<String, ()> {
        keys.iter().map(|k| (k.to_string(), ())).collect()
    }

    #[test]
    fn test_diff_keys() {
        let diff = diff_keys(&map(&["x", "y"]), &map(&["y", "z"]));
        assert_eq!(diff.to_delete, BTreeSet::from(["z".to_string()]));
        assert_eq!(diff.to_insert, BTreeSet::from(["x".to_string()]));
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_identical() {
        let diff = diff_keys(&map(&["a", "b"]), &map(&["b", "a"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_empty_sides() {
        let diff = diff_keys(&map(&[]), &map(&["a"]));
        assert_eq!(diff.to_delete.len(), 1);
        assert!(diff.to_insert.is_empty());

        let diff = diff_keys(&map(&["a"]), &map(&[]));
        assert!(diff.to_delete.is_empty());
        assert_eq!(diff.to_insert.len(), 1);
    }
}
