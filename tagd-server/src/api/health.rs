//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::db::users;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// Database health response
#[derive(Debug, Serialize)]
pub struct DatabaseHealthResponse {
    pub status: String,
    pub database: String,
    pub user_count: Option<i64>,
}

/// GET /health
///
/// Liveness check for monitoring; no authentication.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tagd-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/auth/health
///
/// Reports database reachability. Always 200; failures show up in the body.
pub async fn database_health(State(state): State<AppState>) -> Json<DatabaseHealthResponse> {
    match users::count(&state.db).await {
        Ok(count) => Json(DatabaseHealthResponse {
            status: "ok".to_string(),
            database: "connected".to_string(),
            user_count: Some(count),
        }),
        Err(e) => {
            warn!("Database health check failed: {}", e);
            Json(DatabaseHealthResponse {
                status: "error".to_string(),
                database: "disconnected".to_string(),
                user_count: None,
            })
        }
    }
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/health", get(database_health))
}
