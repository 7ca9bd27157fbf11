//! Catalog maintenance: covers and page counts derived from the book files.

use super::locate_book_file;
use crate::config::{BookFormat, CoverConfig};
use crate::db::Database;
use crate::error::Result;
use crate::formats::{cover_thumbnail, get_handler};
use serde::Serialize;
use std::path::Path;

/// Counters from [`generate_missing_covers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverSummary {
    /// Rows without a cover that were looked at.
    pub processed: usize,
    /// Covers stored.
    pub generated: usize,
    /// Rows whose file could not be found.
    pub missing_file: usize,
    /// Files without an embedded cover.
    pub no_cover: usize,
    /// Files that could not be read or decoded.
    pub failed: usize,
}

/// Counters from [`update_page_counts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageCountSummary {
    /// Page counts stored.
    pub updated: usize,
    /// Rows without a file or without fixed pages.
    pub skipped: usize,
    /// Files that could not be read.
    pub failed: usize,
}

/// Extract, shrink and store a cover for every catalog row that has none.
///
/// A broken file is logged and counted; only storage errors abort the run.
pub fn generate_missing_covers(
    db: &Database,
    root: &Path,
    covers: &CoverConfig,
) -> Result<CoverSummary> {
    let mut summary = CoverSummary::default();

    for row in db.books_missing_cover()? {
        summary.processed += 1;

        let Some(path) = locate_book_file(
            root,
            row.path.as_deref(),
            row.area.as_deref(),
            row.title.as_deref(),
        ) else {
            tracing::debug!(id = row.id, stored = ?row.path, "Book file missing");
            summary.missing_file += 1;
            continue;
        };
        let Some(format) = BookFormat::from_path(&path) else {
            summary.no_cover += 1;
            continue;
        };

        let extracted = get_handler(format)
            .extract_cover(&path)
            .and_then(|data| {
                data.map(|d| cover_thumbnail(&d, covers.width, covers.quality))
                    .transpose()
            });

        match extracted {
            Ok(Some(jpeg)) => {
                db.set_book_cover(row.id, &jpeg)?;
                summary.generated += 1;
            }
            Ok(None) => summary.no_cover += 1,
            Err(e) => {
                tracing::warn!(id = row.id, path = %path.display(), error = %e, "Cover extraction failed");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        generated = summary.generated,
        missing_file = summary.missing_file,
        no_cover = summary.no_cover,
        failed = summary.failed,
        "Cover generation complete"
    );

    Ok(summary)
}

/// Refresh `page_count` for every catalog row whose file has fixed pages.
pub fn update_page_counts(db: &Database, root: &Path) -> Result<PageCountSummary> {
    let mut summary = PageCountSummary::default();

    for row in db.catalog_rows()? {
        let Some(path) = locate_book_file(
            root,
            row.path.as_deref(),
            row.area.as_deref(),
            row.title.as_deref(),
        ) else {
            summary.skipped += 1;
            continue;
        };
        let Some(format) = BookFormat::from_path(&path) else {
            summary.skipped += 1;
            continue;
        };

        match get_handler(format).page_count(&path) {
            Ok(Some(pages)) => {
                db.set_page_count(row.id, i64::from(pages))?;
                summary.updated += 1;
            }
            Ok(None) => summary.skipped += 1,
            Err(e) => {
                tracing::warn!(id = row.id, path = %path.display(), error = %e, "Page count failed");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        "Page count update complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewBook;
    use tempfile::TempDir;

    fn add(db: &Database, path: &str) -> i64 {
        db.insert_book(&NewBook {
            title: path.to_string(),
            area: String::new(),
            path: path.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_covers_count_missing_and_broken_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.pdf"), b"garbage").unwrap();
        std::fs::write(tmp.path().join("kindle.azw"), b"data").unwrap();

        let db = Database::open_memory().unwrap();
        add(&db, "missing.pdf");
        add(&db, "broken.pdf");
        add(&db, "kindle.azw");

        let summary = generate_missing_covers(&db, tmp.path(), &CoverConfig::default()).unwrap();
        assert_eq!(
            summary,
            CoverSummary {
                processed: 3,
                generated: 0,
                missing_file: 1,
                no_cover: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_page_counts_skip_unpaged_formats() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("kindle.azw"), b"data").unwrap();
        std::fs::write(tmp.path().join("broken.pdf"), b"garbage").unwrap();

        let db = Database::open_memory().unwrap();
        add(&db, "kindle.azw");
        add(&db, "broken.pdf");
        add(&db, "");

        let summary = update_page_counts(&db, tmp.path()).unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
    }
}
