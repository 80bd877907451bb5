//! caliquest-server library
//!
//! HTTP surface over the progression engine: accounts, the player map/level
//! views, and the admin authoring dashboard.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use caliquest_common::blob::BlobStore;
use caliquest_common::config::RuntimeSettings;
use caliquest_common::progress::ProgressPolicy;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Uploaded media
    pub blobs: BlobStore,
    /// Runtime settings, read once at startup
    pub settings: RuntimeSettings,
}

impl AppState {
    pub fn new(db: SqlitePool, blobs: BlobStore, settings: RuntimeSettings) -> Self {
        Self { db, blobs, settings }
    }

    pub fn progress_policy(&self) -> ProgressPolicy {
        self.settings.progress_policy()
    }
}

/// Build application router
///
/// Guards, outermost first: `require_session` resolves the bearer token into a
/// `SessionContext`; `require_onboarded` / `require_admin` then gate on the
/// profile flags.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post, put};

    let session_layer = middleware::from_fn_with_state(state.clone(), api::require_session);

    // Any signed-in user
    let session_routes = Router::new()
        .route("/api/auth/sign-out", post(api::sign_out))
        .route("/api/session", get(api::get_session))
        .route("/api/profile", put(api::setup_profile))
        .layer(session_layer.clone());

    // Signed in with profile setup completed
    let game_routes = Router::new()
        .route("/api/maps", get(api::list_maps))
        .route("/api/maps/:id", get(api::get_map))
        .route("/api/levels/:id", get(api::get_level))
        .route("/api/levels/:id/complete", post(api::complete_level))
        .layer(middleware::from_fn(api::require_onboarded))
        .layer(session_layer.clone());

    // Admin profile
    let admin_routes = Router::new()
        .route("/api/admin/maps", get(api::admin_list_maps).post(api::admin_create_map))
        .route("/api/admin/levels", get(api::admin_list_levels).post(api::admin_create_level))
        .route(
            "/api/admin/exercises",
            get(api::admin_list_exercises).post(api::admin_create_exercise),
        )
        .route(
            "/api/admin/uploads",
            post(api::admin_upload).layer(DefaultBodyLimit::max(state.settings.max_upload_bytes)),
        )
        .route("/api/admin/:kind/:id", delete(api::admin_delete))
        .layer(middleware::from_fn(api::require_admin))
        .layer(session_layer);

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/sign-up", post(api::sign_up))
        .route("/api/auth/sign-in", post(api::sign_in))
        .route("/api/auth/password-reset", post(api::request_password_reset))
        .route("/api/auth/password-reset/confirm", post(api::confirm_password_reset))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .nest_service("/media", ServeDir::new(state.blobs.root()));

    Router::new()
        .merge(session_routes)
        .merge(game_routes)
        .merge(admin_routes)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
