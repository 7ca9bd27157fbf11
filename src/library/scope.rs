//! Sync scope: an optional restriction of a run to one sub-folder of the library.

use super::key::{clean_path, key_from_relative};
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Label reported when a run covers the whole library.
pub const FULL_LIBRARY: &str = "(full library)";

/// A resolved sync scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Absolute, lexically cleaned library root.
    pub root: PathBuf,
    /// Directory to walk (the root itself when unscoped).
    pub dir: PathBuf,
    /// Normalized key of `dir` relative to `root`; empty when unscoped.
    pub prefix: String,
}

impl Scope {
    /// Whether the run is restricted to a sub-folder.
    pub fn is_scoped(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Whether a normalized key falls inside this scope.
    pub fn contains_key(&self, key: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        key == self.prefix
            || key
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Human-readable scope name for reports.
    pub fn label(&self) -> &str {
        if self.is_scoped() {
            &self.prefix
        } else {
            FULL_LIBRARY
        }
    }
}

/// Resolve the library root and an optional sub-folder into a [`Scope`].
///
/// Fails with [`AppError::NotFound`] if the root or the sub-folder is not a
/// directory, and with [`AppError::PathEscape`] if the sub-folder resolves
/// outside the root. The escape check runs first, so `../elsewhere` is
/// rejected even when that directory exists.
pub fn resolve_scope(root: &Path, subfolder: Option<&str>) -> Result<Scope> {
    let root = clean_path(&std::path::absolute(root)?);

    if !root.is_dir() {
        return Err(AppError::NotFound(format!(
            "Library root {}",
            root.display()
        )));
    }

    let subfolder = subfolder.map(str::trim).unwrap_or_default();
    if subfolder.is_empty() {
        return Ok(Scope {
            dir: root.clone(),
            root,
            prefix: String::new(),
        });
    }

    let dir = clean_path(&root.join(subfolder.replace('\\', "/")));
    let Ok(relative) = dir.strip_prefix(&root) else {
        return Err(AppError::PathEscape { path: dir });
    };
    let prefix = key_from_relative(relative);

    if !dir.is_dir() {
        return Err(AppError::NotFound(format!("Sub-folder {}", dir.display())));
    }

    tracing::debug!(scope = %prefix, dir = %dir.display(), "Resolved sync scope");

    Ok(Scope { root, dir, prefix })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("lib/Science/Physics")).unwrap();
        std::fs::create_dir_all(dir.path().join("outside")).unwrap();
        dir
    }

    #[test]
    fn test_unscoped() {
        let tmp = library();
        let root = tmp.path().join("lib");

        for sub in [None, Some(""), Some("   ")] {
            let scope = resolve_scope(&root, sub).unwrap();
            assert_eq!(scope.dir, scope.root);
            assert_eq!(scope.prefix, "");
            assert!(!scope.is_scoped());
            assert_eq!(scope.label(), FULL_LIBRARY);
        }
    }

    #[test]
    fn test_scoped() {
        let tmp = library();
        let root = tmp.path().join("lib");

        let scope = resolve_scope(&root, Some("Science/./Physics/")).unwrap();
        assert_eq!(scope.prefix, "Science/Physics");
        assert!(scope.dir.ends_with("Science/Physics"));
        assert_eq!(scope.label(), "Science/Physics");
    }

    #[test]
    fn test_escape_rejected_even_if_exists() {
        let tmp = library();
        let root = tmp.path().join("lib");

        let err = resolve_scope(&root, Some("../outside")).unwrap_err();
        assert!(matches!(err, AppError::PathEscape { .. }));

        let err = resolve_scope(&root, Some("Science/../../outside")).unwrap_err();
        assert!(matches!(err, AppError::PathEscape { .. }));

        let absolute = tmp.path().join("outside");
        let err = resolve_scope(&root, absolute.to_str()).unwrap_err();
        assert!(matches!(err, AppError::PathEscape { .. }));
    }

    #[test]
    fn test_missing_dirs() {
        let tmp = library();
        let root = tmp.path().join("lib");

        let err = resolve_scope(&root, Some("Nope")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = resolve_scope(&tmp.path().join("missing"), None).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_contains_key() {
        let scope = Scope {
            root: PathBuf::from("/lib"),
            dir: PathBuf::from("/lib/A"),
            prefix: "A".to_string(),
        };
        assert!(scope.contains_key("A"));
        assert!(scope.contains_key("A/b.pdf"));
        assert!(scope.contains_key("A/B/c.pdf"));
        assert!(!scope.contains_key("AB/c.pdf"));
        assert!(!scope.contains_key("b.pdf"));

        let full = Scope {
            prefix: String::new(),
            ..scope
        };
        assert!(full.contains_key("anything/at/all.pdf"));
    }
}
