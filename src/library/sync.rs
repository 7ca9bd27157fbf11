//! Folder-to-catalog reconciliation.
//!
//! A run resolves the scope, scans the folder, maps the catalog onto the same
//! keys and diffs the two. [`Reconciler::analyze`] stops there;
//! [`Reconciler::apply`] then deletes catalog rows whose file is gone
//! (together with their reading-list entries and annotations) and inserts a
//! row for every new file, in a single transaction.
//!
//! All filesystem access happens before the write transaction opens, and the
//! filesystem itself is never modified.

use super::catalog::{CatalogMap, DuplicateKey, map_catalog};
use super::diff::{KeyDiff, diff_keys};
use super::maintenance::{CoverSummary, generate_missing_covers};
use super::scanner::{ScanMap, scan_library};
use super::scope::{Scope, resolve_scope};
use crate::config::{CoverConfig, LibraryConfig};
use crate::db::{Database, NewBook};
use crate::error::Result;
use serde::Serialize;

/// Everything needed to apply one sync run.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Resolved scope.
    pub scope: Scope,
    /// Files on disk inside the scope.
    pub scan: ScanMap,
    /// Catalog rows inside the scope.
    pub catalog: CatalogMap,
    /// Pending changes.
    pub diff: KeyDiff,
}

impl SyncPlan {
    /// Catalog IDs scheduled for deletion, in key order.
    pub fn delete_ids(&self) -> Vec<i64> {
        self.diff
            .to_delete
            .iter()
            .filter_map(|key| self.catalog.entries.get(key))
            .map(|record| record.id)
            .collect()
    }

    /// Rows scheduled for insertion, in key order.
    pub fn new_books(&self) -> Vec<NewBook> {
        self.diff
            .to_insert
            .iter()
            .filter_map(|key| self.scan.get(key))
            .map(|entry| NewBook {
                title: entry.file_name.clone(),
                area: entry.area.clone(),
                path: entry.path.to_string_lossy().into_owned(),
            })
            .collect()
    }

    /// Dry-run report.
    pub fn analysis(&self) -> SyncAnalysis {
        SyncAnalysis {
            scope: self.scope.label().to_string(),
            total_in_folder: self.scan.len(),
            total_in_catalog: self.catalog.len(),
            to_insert_count: self.diff.to_insert.len(),
            to_delete_count: self.diff.to_delete.len(),
            inserted_preview: self.diff.to_insert.iter().cloned().collect(),
            deleted_preview: self.diff.to_delete.iter().cloned().collect(),
            duplicates: self.catalog.duplicates.clone(),
        }
    }
}

/// Dry-run report of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncAnalysis {
    /// Sub-folder of the run, or `"(full library)"`.
    pub scope: String,
    /// Supported files found in the scope.
    pub total_in_folder: usize,
    /// Catalog rows mapped into the scope.
    pub total_in_catalog: usize,
    /// Rows that would be inserted.
    pub to_insert_count: usize,
    /// Rows that would be deleted.
    pub to_delete_count: usize,
    /// Keys that would be inserted, sorted.
    pub inserted_preview: Vec<String>,
    /// Keys that would be deleted, sorted.
    pub deleted_preview: Vec<String>,
    /// Catalog key collisions.
    pub duplicates: Vec<DuplicateKey>,
}

/// Row counts written by [`apply_plan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppliedCounts {
    /// Catalog rows deleted.
    pub deleted: usize,
    /// Catalog rows inserted.
    pub inserted: usize,
}

/// Result of an applied sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Catalog rows deleted.
    pub deleted: usize,
    /// Catalog rows inserted.
    pub inserted: usize,
    /// Catalog rows in scope before the run.
    pub catalog_before: usize,
    /// Catalog rows in scope after the run.
    pub catalog_after: usize,
    /// Cover generation summary, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covers: Option<CoverSummary>,
}

/// Persist a plan in one transaction. On error nothing is written.
pub fn apply_plan(db: &Database, plan: &SyncPlan) -> Result<AppliedCounts> {
    let delete_ids = plan.delete_ids();
    let inserts = plan.new_books();

    if delete_ids.is_empty() && inserts.is_empty() {
        return Ok(AppliedCounts::default());
    }

    let (deleted, inserted) = db.reconcile_catalog(&delete_ids, &inserts)?;
    Ok(AppliedCounts { deleted, inserted })
}

/// Entry point for analyze and apply runs.
#[derive(Clone)]
pub struct Reconciler {
    db: Database,
    library: LibraryConfig,
    covers: CoverConfig,
}

impl Reconciler {
    /// Create a reconciler over a catalog and a library folder.
    pub fn new(db: Database, library: LibraryConfig, covers: CoverConfig) -> Self {
        Self {
            db,
            library,
            covers,
        }
    }

    /// Scan, map and diff without writing.
    pub fn plan(&self, subfolder: Option<&str>) -> Result<SyncPlan> {
        let scope = resolve_scope(&self.library.root, subfolder)?;
        let scan = scan_library(&scope)?;
        let catalog = map_catalog(self.db.catalog_rows()?, &scope);
        let diff = diff_keys(&scan, &catalog.entries);

        Ok(SyncPlan {
            scope,
            scan,
            catalog,
            diff,
        })
    }

    /// Report what a sync would change. Never writes.
    pub fn analyze(&self, subfolder: Option<&str>) -> Result<SyncAnalysis> {
        let analysis = self.plan(subfolder)?.analysis();

        tracing::info!(
            scope = %analysis.scope,
            in_folder = analysis.total_in_folder,
            in_catalog = analysis.total_in_catalog,
            to_insert = analysis.to_insert_count,
            to_delete = analysis.to_delete_count,
            "Sync analysis"
        );

        Ok(analysis)
    }

    /// Recompute the plan and apply it.
    ///
    /// With `generate_covers`, cover generation runs after the commit; its
    /// failures do not undo the sync.
    pub fn apply(&self, subfolder: Option<&str>, generate_covers: bool) -> Result<SyncOutcome> {
        let plan = self.plan(subfolder)?;
        let catalog_before = plan.catalog.len();
        let applied = apply_plan(&self.db, &plan)?;
        let catalog_after = catalog_before - plan.diff.to_delete.len() + plan.diff.to_insert.len();

        tracing::info!(
            scope = plan.scope.label(),
            deleted = applied.deleted,
            inserted = applied.inserted,
            before = catalog_before,
            after = catalog_after,
            "Sync applied"
        );

        let covers = if generate_covers {
            match generate_missing_covers(&self.db, &plan.scope.root, &self.covers) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    tracing::warn!(error = %e, "Cover generation after sync failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(SyncOutcome {
            deleted: applied.deleted,
            inserted: applied.inserted,
            catalog_before,
            catalog_after,
            covers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn reconciler(root: &Path) -> (Database, Reconciler) {
        let db = Database::open_memory().unwrap();
        let rec = Reconciler::new(db.clone(), LibraryConfig::new(root), CoverConfig::default());
        (db, rec)
    }

    #[test]
    fn test_plan_builds_inserts_from_scan() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Science/Physics/a.pdf");
        let (_db, rec) = reconciler(tmp.path());

        let plan = rec.plan(None).unwrap();
        let books = plan.new_books();

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "a.pdf");
        assert_eq!(books[0].area, "Science / Physics");
        assert!(Path::new(&books[0].path).is_absolute());
        assert!(plan.delete_ids().is_empty());
    }

    #[test]
    fn test_analyze_reports_full_library() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.epub");
        let (db, rec) = reconciler(tmp.path());
        db.insert_book(&NewBook {
            title: "gone.pdf".to_string(),
            area: String::new(),
            path: tmp.path().join("gone.pdf").to_string_lossy().into_owned(),
        })
        .unwrap();

        let analysis = rec.analyze(None).unwrap();
        assert_eq!(analysis.scope, "(full library)");
        assert_eq!(analysis.total_in_folder, 1);
        assert_eq!(analysis.total_in_catalog, 1);
        assert_eq!(analysis.inserted_preview, vec!["b.epub"]);
        assert_eq!(analysis.deleted_preview, vec!["gone.pdf"]);
    }

    #[test]
    fn test_apply_noop_skips_transaction() {
        let tmp = TempDir::new().unwrap();
        let (db, rec) = reconciler(tmp.path());

        let outcome = rec.apply(None, false).unwrap();
        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.catalog_after, 0);
        assert!(outcome.covers.is_none());
        assert_eq!(db.count_books().unwrap(), 0);
    }
}
