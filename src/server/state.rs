//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::{BookFormat, Config};
use crate::db::{Database, StoredBook};
use crate::error::{AppError, Result};
use crate::library::{self, Reconciler};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Create new application state with database.
    pub fn new(config: Config, db: Database, auth: AuthService) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
        }
    }

    /// Reconciler over the configured library root.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.db.clone(),
            self.config.library.clone(),
            self.config.covers.clone(),
        )
    }

    /// Look up a catalog entry or fail with `NotFound`.
    pub fn book(&self, id: i64) -> Result<StoredBook> {
        self.db
            .get_book(id)?
            .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))
    }

    /// Resolve an entry's file on disk along with its format.
    pub fn book_file(&self, book: &StoredBook) -> Result<(PathBuf, BookFormat)> {
        let path = library::locate_book_file(
            &self.config.library.root,
            book.path.as_deref(),
            book.area.as_deref(),
            Some(book.title.as_str()),
        )
        .ok_or_else(|| AppError::NotFound(format!("File for book {}", book.id)))?;

        let format = BookFormat::from_path(&path).ok_or_else(|| {
            AppError::InvalidFormat(format!("Unsupported file type: {}", path.display()))
        })?;

        Ok((path, format))
    }
}
