//! boxhawk-rv library - photo submission review engine
//!
//! HTTP service over the review engine: submissions, their images, the
//! image audit log and the reviewer queue.

use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

pub mod api;
pub mod db;
pub mod pagination;
pub mod services;
pub mod storage;

use services::{ImageRegistry, Listing, Reassignment, ReviewWorkflow};
use storage::ObjectStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Blob storage
    pub store: Arc<dyn ObjectStore>,
    pub registry: ImageRegistry,
    pub workflow: ReviewWorkflow,
    pub reassignment: Reassignment,
    pub listing: Listing,
    /// Page size when a listing request gives no `limit`
    pub default_page_size: i64,
    /// Directory served under `/media`, if blobs are local
    pub media_root: Option<PathBuf>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, store: Arc<dyn ObjectStore>, default_page_size: i64) -> Self {
        Self {
            registry: ImageRegistry::new(db.clone(), store.clone()),
            workflow: ReviewWorkflow::new(db.clone()),
            reassignment: Reassignment::new(db.clone()),
            listing: Listing::new(db.clone(), store.clone()),
            db,
            store,
            default_page_size,
            media_root: None,
        }
    }

    /// Serve blobs from `root` under `/media`
    pub fn with_media_root(mut self, root: PathBuf) -> Self {
        self.media_root = Some(root);
        self
    }
}

/// Build application router
///
/// `/health` and `/media` are public; every `/api` route requires the caller
/// headers.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post, put};
    use tower_http::services::ServeDir;
    use tower_http::trace::TraceLayer;

    let api = Router::new()
        .route("/api/session", get(api::get_session))
        .route("/api/session/access", get(api::check_access))
        .route(
            "/api/submissions",
            get(api::list_submissions).post(api::create_submission),
        )
        .route("/api/submissions/:id", get(api::get_submission))
        .route("/api/submissions/:id/images", post(api::upload_images))
        .route("/api/submissions/:id/review/start", post(api::start_review))
        .route("/api/submissions/:id/complete", post(api::complete_submission))
        .route("/api/submissions/:id/reject", post(api::reject_submission))
        .route("/api/submissions/:id/reopen", post(api::reopen_submission))
        .route("/api/images/delete", post(api::delete_images))
        .route("/api/images/reassign/existing", post(api::move_to_existing))
        .route("/api/images/reassign/new", post(api::move_to_new))
        .route("/api/images/:id/history", get(api::image_history))
        .route(
            "/api/blobs/*path",
            put(api::put_blob).layer(DefaultBodyLimit::max(api::blobs::MAX_BLOB_BYTES)),
        );

    let mut router = Router::new().merge(api).merge(api::health_routes());

    if let Some(root) = &state.media_root {
        router = router.nest_service("/media", ServeDir::new(root));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
