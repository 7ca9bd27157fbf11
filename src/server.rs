//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let document_routes = Router::new()
        .route("/", get(handlers::documents_list))
        .route("/{id}/details", get(handlers::document_details))
        .route("/{id}/update", put(handlers::document_update))
        .route("/{id}/file", get(handlers::document_file))
        .route("/{id}/cover", get(handlers::document_cover))
        .route("/{id}/page/{page}/text", get(handlers::document_page_text))
        .route(
            "/{id}/annotations",
            get(handlers::annotations_get).post(handlers::annotations_save),
        );

    let reading_list_routes = Router::new()
        .route("/", get(handlers::reading_list_get))
        .route("/add", post(handlers::reading_list_add))
        .route("/remove/{book_id}", delete(handlers::reading_list_remove));

    let request_routes = Router::new()
        .route(
            "/",
            get(handlers::requests_list_all).post(handlers::requests_create),
        )
        .route("/mine", get(handlers::requests_mine))
        .route("/{id}", delete(handlers::requests_cancel))
        .route("/{id}/status", put(handlers::requests_update_status));

    let auth_routes = Router::new()
        .route("/login", post(handlers::auth_login))
        .route("/register", post(handlers::auth_register))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me));

    let admin_routes = Router::new()
        .route("/sync/analyze", post(handlers::admin_sync_analyze))
        .route("/sync/apply", post(handlers::admin_sync_apply))
        .route("/sync/folders", get(handlers::admin_sync_folders));

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api/documents", document_routes)
        .nest("/api/my-list", reading_list_routes)
        .nest("/api/requests", request_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
