//! tagd-server library - TAG Diary HTTP API
//!
//! Family diary backend: photos, audio recordings, vignettes, albums and
//! files behind invite-only accounts.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tagd_common::config::{CorsSettings, TomlConfig};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::storage::FileStore;

pub mod api;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod media;
pub mod pagination;
pub mod storage;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Effective configuration (file + environment)
    pub config: Arc<TomlConfig>,
    /// Where uploaded media is stored
    pub store: Arc<dyn FileStore>,
    /// HS256 signing secret for access tokens
    pub jwt_secret: Arc<str>,
    /// Local uploads directory, served at `/uploads` with the local store
    pub uploads_dir: PathBuf,
}

impl AppState {
    /// Create new application state
    pub fn new(
        db: SqlitePool,
        config: TomlConfig,
        store: Arc<dyn FileStore>,
        jwt_secret: String,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            store,
            jwt_secret: Arc::from(jwt_secret),
            uploads_dir,
        }
    }
}

/// Build application router
///
/// Authentication is enforced per handler by the `CurrentUser` and
/// `AdminUser` extractors, so public and protected routes share one tree.
pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        .merge(api::health_routes())
        .merge(api::routes())
        .with_state(state.clone());

    if state.store.backend_name() == "local" {
        app = app.nest_service("/uploads", ServeDir::new(&state.uploads_dir));
    }

    if let Some(dir) = &state.config.frontend_dir {
        info!("Serving frontend from {}", dir.display());
        let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        app = app.fallback_service(spa);
    }

    app.layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the configured frontend origins (credentials allowed)
fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION])
}
