//! HTTP request handlers.

use crate::db::{self, Annotation, BookRequest, BookUpdate, ReadingListEntry, RequestStatus, StoredBook};
use crate::error::{AppError, Result};
use crate::formats;
use crate::library::{self, Subfolder, SyncAnalysis, SyncOutcome};
use crate::server::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// Default reading-list status.
const DEFAULT_LIST_STATUS: &str = "want_to_read";

/// Build a response, returning 500 on error (which shouldn't happen).
fn build_response(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal error"))
                .unwrap_or_default()
        })
}

/// Run blocking work (file parsing, folder scans) off the async runtime.
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Internal(format!("Background task failed: {}", e)))?
}

/// Plain status message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// ============================================================================
// ROOT
// ============================================================================

/// Service info.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    title: String,
    version: &'static str,
    books: usize,
}

/// API root.
pub async fn index(State(state): State<AppState>) -> Result<Json<ServiceInfo>> {
    Ok(Json(ServiceInfo {
        title: state.config.server.title.clone(),
        version: env!("CARGO_PKG_VERSION"),
        books: state.db.count_books()?,
    }))
}

// ============================================================================
// DOCUMENTS
// ============================================================================

/// List catalog entries.
pub async fn documents_list(State(state): State<AppState>) -> Result<Json<Vec<StoredBook>>> {
    Ok(Json(state.db.list_books()?))
}

/// Catalog entry details.
pub async fn document_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StoredBook>> {
    Ok(Json(state.book(id)?))
}

/// Edit catalog metadata.
pub async fn document_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(update): Json<BookUpdate>,
) -> Result<Json<StoredBook>> {
    let user = get_authenticated_user(&state, &headers).await?;

    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::InvalidFormat("Title cannot be empty".to_string()));
    }

    if !state.db.update_book(id, &update)? {
        return Err(AppError::NotFound(format!("Book not found: {}", id)));
    }

    tracing::info!(book = id, user = %user.email, "Book metadata updated");
    Ok(Json(state.book(id)?))
}

/// Stream the book file.
pub async fn document_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response<Body>> {
    let book = state.book(id)?;
    let (path, format) = state.book_file(&book)?;

    let file = tokio::fs::File::open(&path).await?;
    let size = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().replace('"', "'"))
        .unwrap_or_else(|| book.title.clone());
    let content_disposition = format!("inline; filename=\"{}\"", filename);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.mime_type())
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, size)
        .body(body)
        .unwrap_or_else(|_| Response::default()))
}

/// Stored cover image.
pub async fn document_cover(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response<Body>> {
    let cover = state
        .db
        .get_book_cover(id)?
        .ok_or_else(|| AppError::NotFound(format!("No cover for book {}", id)))?;

    let mut response = build_response(StatusCode::OK, "image/jpeg", cover);
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=86400"),
    );
    Ok(response)
}

/// Page text response.
#[derive(Debug, Serialize)]
pub struct PageTextResponse {
    page: u32,
    text: String,
}

/// Text of one page, for client-side translation or search.
pub async fn document_page_text(
    State(state): State<AppState>,
    Path((id, page)): Path<(i64, u32)>,
) -> Result<Json<PageTextResponse>> {
    let book = state.book(id)?;
    let (path, format) = state.book_file(&book)?;

    let text = blocking(move || formats::get_handler(format).page_text(&path, page))
        .await?
        .ok_or_else(|| {
            AppError::InvalidFormat(format!(
                "{} files have no fixed pages",
                format.mime_type()
            ))
        })?;

    Ok(Json(PageTextResponse { page, text }))
}

// ============================================================================
// ANNOTATIONS
// ============================================================================

fn empty_annotations() -> serde_json::Value {
    serde_json::json!({
        "bookmarks": [],
        "notes": {},
        "highlights": {},
    })
}

/// Get the caller's annotations for a book.
pub async fn annotations_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let user = get_authenticated_user(&state, &headers).await?;
    state.book(id)?;

    let data = state
        .db
        .get_annotation(&user.id, id)?
        .map(|a| a.data)
        .unwrap_or_else(empty_annotations);

    Ok(Json(data))
}

/// Replace the caller's annotations for a book.
pub async fn annotations_save(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(data): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    let user = get_authenticated_user(&state, &headers).await?;
    state.book(id)?;

    if !data.is_object() {
        return Err(AppError::InvalidFormat(
            "Annotations must be a JSON object".to_string(),
        ));
    }

    state.db.save_annotation(&Annotation {
        user_id: user.id,
        book_id: id,
        data: data.clone(),
        updated_at: db::now_timestamp(),
    })?;

    Ok(Json(data))
}

// ============================================================================
// READING LIST
// ============================================================================

/// Add-to-list query parameters.
#[derive(Debug, Deserialize)]
pub struct AddToListQuery {
    book_id: i64,
    status: Option<String>,
}

/// The caller's reading list.
pub async fn reading_list_get(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ReadingListEntry>>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(state.db.get_reading_list(&user.id)?))
}

/// Add a book to the caller's reading list.
pub async fn reading_list_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AddToListQuery>,
) -> Result<Json<MessageResponse>> {
    let user = get_authenticated_user(&state, &headers).await?;
    state.book(query.book_id)?;

    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LIST_STATUS);

    if state
        .db
        .add_to_reading_list(&user.id, query.book_id, status)?
    {
        Ok(MessageResponse::new("Book added to your list"))
    } else {
        Ok(MessageResponse::new("Book is already in your list"))
    }
}

/// Remove a book from the caller's reading list.
pub async fn reading_list_remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let user = get_authenticated_user(&state, &headers).await?;

    if !state.db.remove_from_reading_list(&user.id, book_id)? {
        return Err(AppError::NotFound(format!(
            "Book {} is not in your list",
            book_id
        )));
    }

    Ok(MessageResponse::new("Book removed from your list"))
}

// ============================================================================
// BOOK REQUESTS
// ============================================================================

/// New book request.
#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    title: String,
    author: String,
    publisher: Option<String>,
    notes: Option<String>,
}

/// Status change.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateBody {
    status: RequestStatus,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Create a book request.
pub async fn requests_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Result<Json<BookRequest>> {
    let user = get_authenticated_user(&state, &headers).await?;

    let (title, author) = (body.title.trim(), body.author.trim());
    if title.is_empty() || author.is_empty() {
        return Err(AppError::InvalidFormat(
            "Title and author are required".to_string(),
        ));
    }

    let id = state.db.create_request(
        &user.id,
        title,
        author,
        non_blank(body.publisher.as_deref()),
        non_blank(body.notes.as_deref()),
    )?;

    let request = state
        .db
        .get_request(id)?
        .ok_or_else(|| AppError::Internal(format!("Request {} vanished after insert", id)))?;

    Ok(Json(request))
}

/// The caller's requests.
pub async fn requests_mine(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookRequest>>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(state.db.list_user_requests(&user.id)?))
}

/// All requests (admin).
pub async fn requests_list_all(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookRequest>>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.db.list_requests()?))
}

/// Cancel one of the caller's pending requests.
pub async fn requests_cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let user = get_authenticated_user(&state, &headers).await?;

    let request = state
        .db
        .get_request(id)?
        .ok_or_else(|| AppError::NotFound(format!("Request not found: {}", id)))?;

    if request.user_id != user.id {
        return Err(AppError::Forbidden(
            "You can only cancel your own requests".to_string(),
        ));
    }
    if request.status != RequestStatus::Pending {
        return Err(AppError::InvalidFormat(
            "Only pending requests can be cancelled".to_string(),
        ));
    }

    state.db.delete_request(id)?;
    Ok(MessageResponse::new("Request cancelled"))
}

/// Change a request's status (admin).
pub async fn requests_update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdateBody>,
) -> Result<Json<MessageResponse>> {
    let admin = require_admin(&state, &headers).await?;

    if !state.db.update_request_status(id, body.status)? {
        return Err(AppError::NotFound(format!("Request not found: {}", id)));
    }

    tracing::info!(request = id, status = body.status.as_str(), admin = %admin.email, "Request status changed");
    Ok(MessageResponse::new(format!(
        "Request marked as {}",
        body.status.as_str()
    )))
}

// ============================================================================
// AUTH API
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user_id: String,
    name: String,
    email: String,
    role: String,
}

impl LoginResponse {
    fn new(user: db::User, token: String) -> Json<Self> {
        Json(Self {
            token,
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        })
    }
}

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = state.auth.login(&req.email, &req.password)?;
    Ok(LoginResponse::new(user, token))
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>> {
    state.auth.register(&req.name, &req.email, &req.password)?;
    let (user, token) = state.auth.login(&req.email, &req.password)?;
    Ok(LoginResponse::new(user, token))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(user))
}

// ============================================================================
// ADMIN: CATALOG SYNC
// ============================================================================

/// Sync request body. Send `{}` for a full-library run.
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    subfolder: Option<String>,
    #[serde(default)]
    generate_covers: bool,
}

/// Dry-run a sync.
pub async fn admin_sync_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncAnalysis>> {
    require_admin(&state, &headers).await?;

    let reconciler = state.reconciler();
    let analysis = blocking(move || reconciler.analyze(req.subfolder.as_deref())).await?;

    Ok(Json(analysis))
}

/// Apply a sync.
pub async fn admin_sync_apply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncOutcome>> {
    let admin = require_admin(&state, &headers).await?;
    tracing::info!(admin = %admin.email, subfolder = ?req.subfolder, "Sync requested over HTTP");

    let reconciler = state.reconciler();
    let outcome =
        blocking(move || reconciler.apply(req.subfolder.as_deref(), req.generate_covers)).await?;

    Ok(Json(outcome))
}

/// Folder tree under the library root.
pub async fn admin_sync_folders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Subfolder>>> {
    require_admin(&state, &headers).await?;

    let root = state.config.library.root.clone();
    let folders = blocking(move || library::list_subfolders(&root)).await?;

    Ok(Json(folders))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Get authenticated user from token.
async fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .validate_token(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
}

/// Get authenticated admin from token.
async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    let user = get_authenticated_user(state, headers).await?;
    if !state.auth.is_admin(&user) {
        return Err(AppError::Forbidden("Administrator access required".to_string()));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_blocking_propagates_errors() {
        let ok = tokio_test::block_on(blocking(|| Ok(21 * 2))).unwrap();
        assert_eq!(ok, 42);

        let err = tokio_test::block_on(blocking::<(), _>(|| {
            Err(AppError::NotFound("x".into()))
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_empty_annotations_shape() {
        let value = empty_annotations();
        assert!(value["bookmarks"].as_array().unwrap().is_empty());
        assert!(value["notes"].as_object().unwrap().is_empty());
        assert!(value["highlights"].as_object().unwrap().is_empty());
    }
}
