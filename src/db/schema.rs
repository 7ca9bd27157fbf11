use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

/// Columns selected for a [`StoredBook`], in `row_to_stored_book` order.
const BOOK_COLUMNS: &str = "id, title, author, year, publisher, genre, area, language, \
     page_count, synopsis, path, cover IS NOT NULL, created_at";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Catalog table
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT '',
                author TEXT,
                year INTEGER,
                publisher TEXT,
                genre TEXT,
                area TEXT,
                language TEXT,
                page_count INTEGER,
                synopsis TEXT,
                path TEXT,
                cover BLOB,
                created_at INTEGER NOT NULL
            );

            -- Reading list (no cascade: sync deletes children explicitly)
            CREATE TABLE IF NOT EXISTS reading_list (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                book_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'want_to_read',
                added_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id)
            );

            -- Annotations (one JSON document per user and book)
            CREATE TABLE IF NOT EXISTS annotations (
                user_id TEXT NOT NULL,
                book_id INTEGER NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id)
            );

            -- Book requests
            CREATE TABLE IF NOT EXISTS book_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                publisher TEXT,
                notes TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            CREATE INDEX IF NOT EXISTS idx_reading_list_book ON reading_list(book_id);
            CREATE INDEX IF NOT EXISTS idx_annotations_book ON annotations(book_id);
            CREATE INDEX IF NOT EXISTS idx_requests_user ON book_requests(user_id);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
            last_login: row.get(6)?,
        })
    }

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.role,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::InvalidFormat(format!("E-mail '{}' is already registered", user.email))
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get user by e-mail.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, email, password_hash, role, created_at, last_login
             FROM users WHERE email = ?1",
            params![email],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, email, password_hash, role, created_at, last_login
             FROM users WHERE id = ?1",
            params![id],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, email, password_hash, role, created_at, last_login
                 FROM users ORDER BY email",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], Self::row_to_user)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Update user password.
    pub fn update_user_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE email = ?2",
                params![password_hash, email],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Delete user.
    pub fn delete_user(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE email = ?1", params![email])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Remove expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== CATALOG OPERATIONS ==========

    fn row_to_stored_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredBook> {
        Ok(StoredBook {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            year: row.get(3)?,
            publisher: row.get(4)?,
            genre: row.get(5)?,
            area: row.get(6)?,
            language: row.get(7)?,
            page_count: row.get(8)?,
            synopsis: row.get(9)?,
            path: row.get(10)?,
            has_cover: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    /// Insert a single catalog entry and return its ID.
    pub fn insert_book(&self, book: &NewBook) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books (title, area, path, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![book.title, book.area, book.path, now_timestamp()],
        )
        .map_err(|e| AppError::Internal(format!("Failed to insert book: {}", e)))?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a catalog entry by ID.
    pub fn get_book(&self, id: i64) -> Result<Option<StoredBook>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
            params![id],
            Self::row_to_stored_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// List all catalog entries ordered by title.
    pub fn list_books(&self) -> Result<Vec<StoredBook>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BOOK_COLUMNS} FROM books ORDER BY title COLLATE NOCASE, id"
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map([], Self::row_to_stored_book)
            .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Count catalog entries.
    pub fn count_books(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to count books: {}", e)))?;
        Ok(count as usize)
    }

    /// Update editable metadata; absent fields keep their value.
    pub fn update_book(&self, id: i64, update: &BookUpdate) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET
                    title = COALESCE(?1, title),
                    author = COALESCE(?2, author),
                    year = COALESCE(?3, year),
                    publisher = COALESCE(?4, publisher),
                    genre = COALESCE(?5, genre),
                    area = COALESCE(?6, area),
                    language = COALESCE(?7, language),
                    synopsis = COALESCE(?8, synopsis)
                 WHERE id = ?9",
                params![
                    update.title,
                    update.author,
                    update.year,
                    update.publisher,
                    update.genre,
                    update.area,
                    update.language,
                    update.synopsis,
                    id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Fetch `(id, path, title, area)` for every catalog row.
    pub fn catalog_rows(&self) -> Result<Vec<CatalogRow>> {
        self.query_catalog_rows("SELECT id, path, title, area FROM books ORDER BY id")
    }

    /// Catalog rows without a cover yet.
    pub fn books_missing_cover(&self) -> Result<Vec<CatalogRow>> {
        self.query_catalog_rows(
            "SELECT id, path, title, area FROM books WHERE cover IS NULL ORDER BY id",
        )
    }

    fn query_catalog_rows(&self, sql: &str) -> Result<Vec<CatalogRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CatalogRow {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    title: row.get(2)?,
                    area: row.get(3)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to read catalog: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect catalog: {}", e)))?;

        Ok(rows)
    }

    /// Get the stored cover image.
    pub fn get_book_cover(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let cover: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT cover FROM books WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get cover: {}", e)))?;
        Ok(cover.flatten())
    }

    /// Store a cover image.
    pub fn set_book_cover(&self, id: i64, cover: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE books SET cover = ?1 WHERE id = ?2",
            params![cover, id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save cover: {}", e)))?;
        Ok(())
    }

    /// Store a page count.
    pub fn set_page_count(&self, id: i64, pages: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE books SET page_count = ?1 WHERE id = ?2",
            params![pages, id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save page count: {}", e)))?;
        Ok(())
    }

    /// Delete catalog rows (and their reading-list entries and annotations),
    /// then insert new rows, all in one transaction.
    ///
    /// Returns `(deleted, inserted)` row counts. On any error the transaction
    /// is rolled back and the catalog is left exactly as it was.
    pub fn reconcile_catalog(
        &self,
        delete_ids: &[i64],
        inserts: &[NewBook],
    ) -> Result<(usize, usize)> {
        let mut conn = self.conn.lock();
        Self::reconcile_in_transaction(&mut conn, delete_ids, inserts).map_err(|e| {
            tracing::warn!(error = %e, "Catalog reconcile rolled back");
            AppError::SyncFailure(e)
        })
    }

    fn reconcile_in_transaction(
        conn: &mut Connection,
        delete_ids: &[i64],
        inserts: &[NewBook],
    ) -> rusqlite::Result<(usize, usize)> {
        // Dropping `tx` without commit rolls back.
        let tx = conn.transaction()?;
        let mut deleted = 0;
        let mut inserted = 0;

        {
            let mut delete_list = tx.prepare("DELETE FROM reading_list WHERE book_id = ?1")?;
            let mut delete_notes = tx.prepare("DELETE FROM annotations WHERE book_id = ?1")?;
            let mut delete_book = tx.prepare("DELETE FROM books WHERE id = ?1")?;

            for id in delete_ids {
                delete_list.execute(params![id])?;
                delete_notes.execute(params![id])?;
                deleted += delete_book.execute(params![id])?;
            }

            let now = now_timestamp();
            let mut insert_book = tx.prepare(
                "INSERT INTO books (title, area, path, created_at) VALUES (?1, ?2, ?3, ?4)",
            )?;

            for book in inserts {
                inserted += insert_book.execute(params![book.title, book.area, book.path, now])?;
            }
        }

        tx.commit()?;
        Ok((deleted, inserted))
    }

    // ========== READING LIST OPERATIONS ==========

    /// Add a book to a user's reading list. Returns `false` if it was already listed.
    pub fn add_to_reading_list(&self, user_id: &str, book_id: i64, status: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO reading_list (user_id, book_id, status, added_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, book_id, status, now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to add to reading list: {}", e)))?;
        Ok(rows > 0)
    }

    /// Get a user's reading list with book data.
    pub fn get_reading_list(&self, user_id: &str) -> Result<Vec<ReadingListEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.status, r.added_at,
                        b.id, b.title, b.author, b.year, b.publisher, b.genre, b.area,
                        b.language, b.page_count, b.synopsis, b.path, b.cover IS NOT NULL,
                        b.created_at
                 FROM reading_list r JOIN books b ON b.id = r.book_id
                 WHERE r.user_id = ?1
                 ORDER BY r.added_at DESC, r.id DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let entries = stmt
            .query_map(params![user_id], |row| {
                Ok(ReadingListEntry {
                    id: row.get(0)?,
                    status: row.get(1)?,
                    added_at: row.get(2)?,
                    book: StoredBook {
                        id: row.get(3)?,
                        title: row.get(4)?,
                        author: row.get(5)?,
                        year: row.get(6)?,
                        publisher: row.get(7)?,
                        genre: row.get(8)?,
                        area: row.get(9)?,
                        language: row.get(10)?,
                        page_count: row.get(11)?,
                        synopsis: row.get(12)?,
                        path: row.get(13)?,
                        has_cover: row.get(14)?,
                        created_at: row.get(15)?,
                    },
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get reading list: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect reading list: {}", e)))?;

        Ok(entries)
    }

    /// Remove a book from a user's reading list.
    pub fn remove_from_reading_list(&self, user_id: &str, book_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM reading_list WHERE user_id = ?1 AND book_id = ?2",
                params![user_id, book_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to remove from reading list: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== ANNOTATION OPERATIONS ==========

    /// Insert or replace the annotation document for a user and book.
    pub fn save_annotation(&self, annotation: &Annotation) -> Result<()> {
        let data = serde_json::to_string(&annotation.data)
            .map_err(|e| AppError::InvalidFormat(format!("Invalid annotation data: {}", e)))?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO annotations (user_id, book_id, data, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, book_id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![
                annotation.user_id,
                annotation.book_id,
                data,
                annotation.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save annotation: {}", e)))?;
        Ok(())
    }

    /// Get the annotation document for a user and book.
    pub fn get_annotation(&self, user_id: &str, book_id: i64) -> Result<Option<Annotation>> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT data, updated_at FROM annotations WHERE user_id = ?1 AND book_id = ?2",
                params![user_id, book_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get annotation: {}", e)))?;

        let Some((data, updated_at)) = row else {
            return Ok(None);
        };

        let data = serde_json::from_str(&data)
            .map_err(|e| AppError::Internal(format!("Corrupt annotation data: {}", e)))?;

        Ok(Some(Annotation {
            user_id: user_id.to_string(),
            book_id,
            data,
            updated_at,
        }))
    }

    // ========== BOOK REQUEST OPERATIONS ==========

    fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookRequest> {
        let status: String = row.get(6)?;
        Ok(BookRequest {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            publisher: row.get(4)?,
            notes: row.get(5)?,
            status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Pending),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            user_name: row.get(9)?,
            user_email: row.get(10)?,
        })
    }

    /// Create a book request and return its ID.
    pub fn create_request(
        &self,
        user_id: &str,
        title: &str,
        author: &str,
        publisher: Option<&str>,
        notes: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO book_requests (user_id, title, author, publisher, notes, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                user_id,
                title,
                author,
                publisher,
                notes,
                RequestStatus::Pending.as_str(),
                now,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create request: {}", e)))?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a request by ID.
    pub fn get_request(&self, id: i64) -> Result<Option<BookRequest>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT r.id, r.user_id, r.title, r.author, r.publisher, r.notes, r.status,
                    r.created_at, r.updated_at, NULL, NULL
             FROM book_requests r WHERE r.id = ?1",
            params![id],
            Self::row_to_request,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get request: {}", e)))
    }

    /// All requests with requester details, newest first.
    pub fn list_requests(&self) -> Result<Vec<BookRequest>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.user_id, r.title, r.author, r.publisher, r.notes, r.status,
                        r.created_at, r.updated_at, u.name, u.email
                 FROM book_requests r JOIN users u ON u.id = r.user_id
                 ORDER BY r.created_at DESC, r.id DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let requests = stmt
            .query_map([], Self::row_to_request)
            .map_err(|e| AppError::Internal(format!("Failed to list requests: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect requests: {}", e)))?;

        Ok(requests)
    }

    /// A user's own requests, newest first.
    pub fn list_user_requests(&self, user_id: &str) -> Result<Vec<BookRequest>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.user_id, r.title, r.author, r.publisher, r.notes, r.status,
                        r.created_at, r.updated_at, NULL, NULL
                 FROM book_requests r WHERE r.user_id = ?1
                 ORDER BY r.created_at DESC, r.id DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let requests = stmt
            .query_map(params![user_id], Self::row_to_request)
            .map_err(|e| AppError::Internal(format!("Failed to list requests: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect requests: {}", e)))?;

        Ok(requests)
    }

    /// Change a request's status.
    pub fn update_request_status(&self, id: i64, status: RequestStatus) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE book_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now_timestamp(), id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update request: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete a request.
    pub fn delete_request(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM book_requests WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete request: {}", e)))?;
        Ok(rows > 0)
    }
}
