//! Folder scanning.

use super::key::{area_from_relative_dir, key_from_relative};
use super::scope::Scope;
use crate::config::BookFormat;
use crate::error::{AppError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A supported book file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsEntry {
    /// Bare file name, used as the catalog title on insert.
    pub file_name: String,
    /// Display area of the containing directory (`""` at the root).
    pub area: String,
    /// Absolute path of the file.
    pub path: PathBuf,
}

/// Normalized key to file, ordered by key.
pub type ScanMap = BTreeMap<String, FsEntry>;

/// A directory under the library root, for picking a sync scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subfolder {
    /// Path relative to the root, `/` separated.
    pub path: String,
    /// Nesting depth; top-level folders are 0.
    pub depth: usize,
}

impl Subfolder {
    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// ASCII tree label (`|   |-- name`).
    pub fn tree_label(&self) -> String {
        if self.depth == 0 {
            self.name().to_string()
        } else {
            format!("{}|-- {}", "|   ".repeat(self.depth), self.name())
        }
    }
}

/// Walk the scoped directory and collect supported book files.
///
/// Keys are relative to the full library root, not to the scope, so scoped
/// and unscoped scans agree on every key they share.
pub fn scan_library(scope: &Scope) -> Result<ScanMap> {
    let mut entries = ScanMap::new();

    for entry in WalkDir::new(&scope.dir).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(&scope.dir, e))?;
        let path = entry.path();

        if !path.is_file() || BookFormat::from_path(path).is_none() {
            continue;
        }

        let Ok(relative) = path.strip_prefix(&scope.root) else {
            continue;
        };

        let key = key_from_relative(relative);
        let area = relative
            .parent()
            .map(area_from_relative_dir)
            .unwrap_or_default();
        let file_name = entry.file_name().to_string_lossy().into_owned();

        let previous = entries.insert(
            key.clone(),
            FsEntry {
                file_name,
                area,
                path: path.to_path_buf(),
            },
        );
        if previous.is_some() {
            tracing::warn!(key = %key, path = %path.display(), "Two files map to the same key");
        }
    }

    tracing::debug!(scope = scope.label(), files = entries.len(), "Folder scan complete");

    Ok(entries)
}

/// List every directory under `root`, depth-first in name order.
pub fn list_subfolders(root: &Path) -> Result<Vec<Subfolder>> {
    if !root.is_dir() {
        return Err(AppError::NotFound(format!(
            "Library root {}",
            root.display()
        )));
    }

    let mut folders = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        folders.push(Subfolder {
            path: relative.to_string_lossy().replace('\\', "/"),
            depth: entry.depth() - 1,
        });
    }

    Ok(folders)
}

fn walk_error(fallback: &Path, err: walkdir::Error) -> AppError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());

    let source = match err.into_io_error() {
        Some(io) => io,
        None => std::io::Error::other("filesystem loop detected"),
    };

    AppError::ScanFailure { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::scope::resolve_scope;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scan_collects_supported_files() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "A/b.pdf");
        touch(tmp.path(), "c.epub");
        touch(tmp.path(), "A/notes.txt");
        touch(tmp.path(), "A/B/d.AZW");

        let scope = resolve_scope(tmp.path(), None).unwrap();
        let scan = scan_library(&scope).unwrap();

        assert_eq!(scan.len(), 3);

        let b = &scan["A/b.pdf"];
        assert_eq!(b.file_name, "b.pdf");
        assert_eq!(b.area, "A");
        assert!(b.path.is_absolute());

        assert_eq!(scan["c.epub"].area, "");
        assert_eq!(scan["A/B/d.AZW"].area, "A / B");
    }

    #[test]
    fn test_scoped_scan_uses_root_relative_keys() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "A/b.pdf");
        touch(tmp.path(), "A/B/c.pdf");
        touch(tmp.path(), "Z/d.pdf");

        let scope = resolve_scope(tmp.path(), Some("A")).unwrap();
        let scan = scan_library(&scope).unwrap();

        let keys: Vec<_> = scan.keys().cloned().collect();
        assert_eq!(keys, vec!["A/B/c.pdf", "A/b.pdf"]);
    }

    #[test]
    fn test_empty_library() {
        let tmp = TempDir::new().unwrap();
        let scope = resolve_scope(tmp.path(), None).unwrap();
        assert!(scan_library(&scope).unwrap().is_empty());
    }

    #[test]
    fn test_list_subfolders() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("B/Inner")).unwrap();
        fs::create_dir_all(tmp.path().join("A")).unwrap();
        touch(tmp.path(), "A/x.pdf");

        let folders = list_subfolders(tmp.path()).unwrap();
        let listed: Vec<_> = folders.iter().map(|f| (f.path.as_str(), f.depth)).collect();
        assert_eq!(listed, vec![("A", 0), ("B", 0), ("B/Inner", 1)]);

        assert_eq!(folders[2].name(), "Inner");
        assert_eq!(folders[2].tree_label(), "|   |-- Inner");
        assert_eq!(folders[0].tree_label(), "A");
    }
}
