//! Folder-backed library: key normalization, scanning and catalog sync.

pub mod catalog;
pub mod diff;
pub mod key;
pub mod maintenance;
pub mod scanner;
pub mod scope;
pub mod sync;

pub use maintenance::{CoverSummary, PageCountSummary, generate_missing_covers, update_page_counts};
pub use scanner::{FsEntry, ScanMap, Subfolder, list_subfolders, scan_library};
pub use scope::{Scope, resolve_scope};
pub use sync::{Reconciler, SyncAnalysis, SyncOutcome, SyncPlan, apply_plan};

use key::key_from_metadata;
use std::path::{Path, PathBuf};

/// Locate a catalog entry's file from its stored path.
///
/// Absolute paths are used as is; relative ones are taken from the library root.
pub fn resolve_book_file(root: &Path, stored: &str) -> PathBuf {
    let stored = Path::new(stored.trim());
    if stored.is_absolute() {
        stored.to_path_buf()
    } else {
        root.join(stored)
    }
}

/// Find a catalog entry's file on disk.
///
/// The stored path is tried first. Rows kept by a sync through their area and
/// title (a stored path from an old mount point) are found where a sync would
/// put them, at `root/<area>/<title>`.
pub fn locate_book_file(
    root: &Path,
    stored: Option<&str>,
    area: Option<&str>,
    title: Option<&str>,
) -> Option<PathBuf> {
    if let Some(stored) = stored.map(str::trim).filter(|p| !p.is_empty()) {
        let path = resolve_book_file(root, stored);
        if path.is_file() {
            return Some(path);
        }
    }

    let key = key_from_metadata(area.unwrap_or_default(), title.unwrap_or_default());
    if key.is_empty() || key == ".." || key.starts_with("../") || Path::new(&key).has_root() {
        return None;
    }

    let path = root.join(key);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_book_file() {
        let tmp = TempDir::new().unwrap();
        let abs = tmp.path().join("a.pdf");
        std::fs::write(&abs, b"x").unwrap();

        assert_eq!(resolve_book_file(Path::new("/lib"), abs.to_str().unwrap()), abs);
        assert_eq!(
            resolve_book_file(Path::new("/lib"), "Science/b.pdf"),
            PathBuf::from("/lib/Science/b.pdf")
        );
        assert_eq!(
            resolve_book_file(Path::new("/lib"), " Science/b.pdf "),
            PathBuf::from("/lib/Science/b.pdf")
        );
    }

    #[test]
    fn test_locate_book_file_falls_back_to_area_and_title() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("lib");
        let file = root.join("Science/Physics/qm.pdf");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"x").unwrap();

        let found = locate_book_file(
            &root,
            Some("/mnt/old-disk/Science/Physics/qm.pdf"),
            Some("Science / Physics"),
            Some("qm.pdf"),
        );
        assert_eq!(found, Some(file));

        // Stored path wins when it exists
        let found = locate_book_file(&root, Some("Science/Physics/qm.pdf"), Some("Other"), Some("x.pdf"));
        assert_eq!(found, Some(root.join("Science/Physics/qm.pdf")));

        assert!(locate_book_file(&root, None, Some("Science"), Some("qm.pdf")).is_none());
        assert!(locate_book_file(&root, Some(""), None, None).is_none());
    }

    #[test]
    fn test_locate_book_file_stays_under_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("lib");
        std::fs::create_dir_all(&root).unwrap();
        let outside = tmp.path().join("secret.pdf");
        std::fs::write(&outside, b"x").unwrap();

        assert!(locate_book_file(&root, None, Some(""), Some("../secret.pdf")).is_none());
        assert!(locate_book_file(&root, None, Some(".."), Some("secret.pdf")).is_none());
        let absolute = outside.to_string_lossy().into_owned();
        assert!(locate_book_file(&root, None, None, Some(&absolute)).is_none());
    }
}
