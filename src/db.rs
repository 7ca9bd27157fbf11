mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// E-mail used for login.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role: "admin" or "user".
    pub role: String,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Catalog entry as stored in the `books` table (cover blob excluded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBook {
    /// Numeric catalog ID.
    pub id: i64,
    /// Title. Sync inserts the file name here.
    pub title: String,
    /// Author.
    pub author: Option<String>,
    /// Publication year.
    pub year: Option<i64>,
    /// Publisher.
    pub publisher: Option<String>,
    /// Genre.
    pub genre: Option<String>,
    /// Area label (directory chain under the library root, `" / "` separated).
    pub area: Option<String>,
    /// Language.
    pub language: Option<String>,
    /// Page count.
    pub page_count: Option<i64>,
    /// Synopsis.
    pub synopsis: Option<String>,
    /// Stored path, absolute or relative to the library root.
    pub path: Option<String>,
    /// Whether a cover image is stored.
    pub has_cover: bool,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Minimal projection of a catalog row used by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// Numeric catalog ID.
    pub id: i64,
    /// Stored path.
    pub path: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Area label.
    pub area: Option<String>,
}

/// New catalog row produced by a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBook {
    /// Title (the file name).
    pub title: String,
    /// Area label.
    pub area: String,
    /// Absolute file path.
    pub path: String,
}

/// Editable catalog metadata. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookUpdate {
    /// Title.
    pub title: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// Publication year.
    pub year: Option<i64>,
    /// Publisher.
    pub publisher: Option<String>,
    /// Genre.
    pub genre: Option<String>,
    /// Area label.
    pub area: Option<String>,
    /// Language.
    pub language: Option<String>,
    /// Synopsis.
    pub synopsis: Option<String>,
}

/// Reading list entry joined with its book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingListEntry {
    /// Reading list row ID.
    pub id: i64,
    /// Reading status (e.g. "want_to_read", "reading", "finished").
    pub status: String,
    /// When the book was added to the list.
    pub added_at: i64,
    /// The listed book.
    pub book: StoredBook,
}

/// Annotation document for a (user, book) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// User ID.
    pub user_id: String,
    /// Book ID.
    pub book_id: i64,
    /// Bookmarks, notes and highlights as sent by the reader.
    pub data: serde_json::Value,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Lifecycle of a book request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for an administrator.
    Pending,
    /// Being looked at.
    InReview,
    /// Accepted.
    Approved,
    /// Declined.
    Rejected,
}

impl RequestStatus {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InReview => "in_review",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Parse the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "in_review" => Some(RequestStatus::InReview),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A user's request for a book that is not in the library yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRequest {
    /// Request ID.
    pub id: i64,
    /// Requesting user.
    pub user_id: String,
    /// Requested title.
    pub title: String,
    /// Requested author.
    pub author: String,
    /// Publisher, if known.
    pub publisher: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Current status.
    pub status: RequestStatus,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last status change.
    pub updated_at: i64,
    /// Requester name (filled on admin listings).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Requester e-mail (filled on admin listings).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
