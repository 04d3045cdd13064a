//! Vignette endpoints
//!
//! Any signed-in member may write vignettes and read their own; admins read
//! all of them. Edits and deletion are admin-only.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tagd_common::db::Vignette;
use tagd_common::time::parse_client_datetime;
use tracing::info;

use super::photos::visible_photo_ids;
use super::{can_read, message, owner_filter, AdminUser, CurrentUser, MessageResponse};
use crate::db::vignettes::{self, VignettePatch};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VignetteRequest {
    pub title: String,
    pub content: Option<String>,
    pub photo_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct VignettePatchRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub created_at: Option<String>,
}

/// Vignette with its linked photos in display order
#[derive(Debug, Serialize)]
pub struct VignetteResponse {
    #[serde(flatten)]
    pub vignette: Vignette,
    pub photo_ids: Vec<i64>,
}

async fn with_photos(state: &AppState, vignette: Vignette) -> ApiResult<VignetteResponse> {
    let photo_ids = vignettes::photo_ids(&state.db, vignette.id).await?;
    Ok(VignetteResponse {
        vignette,
        photo_ids,
    })
}

fn required_title(title: &str) -> ApiResult<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    Ok(title)
}

/// POST /api/vignettes
pub async fn create_vignette(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<VignetteRequest>,
) -> ApiResult<Json<VignetteResponse>> {
    let title = required_title(&request.title)?;
    let photo_ids = visible_photo_ids(
        &state,
        &user,
        request.photo_ids.as_deref().unwrap_or_default(),
    )
    .await?;
    let vignette = vignettes::create(
        &state.db,
        user.id,
        title,
        request.content.as_deref(),
        &photo_ids,
    )
    .await?;

    info!("Vignette {} created by '{}'", vignette.id, user.username);
    Ok(Json(with_photos(&state, vignette).await?))
}

/// GET /api/vignettes
pub async fn list_vignettes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<VignetteResponse>>> {
    let mut response = Vec::new();
    for vignette in vignettes::list(&state.db, owner_filter(&user)).await? {
        response.push(with_photos(&state, vignette).await?);
    }
    Ok(Json(response))
}

/// GET /api/vignettes/:id
pub async fn get_vignette(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<VignetteResponse>> {
    let vignette = vignettes::get(&state.db, id)
        .await?
        .filter(|vignette| can_read(&user, vignette.author_id))
        .ok_or_else(|| ApiError::not_found("Vignette"))?;
    Ok(Json(with_photos(&state, vignette).await?))
}

/// PUT /api/vignettes/:id (admin)
pub async fn update_vignette(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<VignetteRequest>,
) -> ApiResult<Json<VignetteResponse>> {
    let title = required_title(&request.title)?;
    let vignette = vignettes::replace(
        &state.db,
        id,
        title,
        request.content.as_deref(),
        request.photo_ids.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Vignette"))?;

    info!("Vignette {} updated by admin '{}'", id, admin.username);
    Ok(Json(with_photos(&state, vignette).await?))
}

/// PATCH /api/vignettes/:id (admin)
pub async fn patch_vignette(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<VignettePatchRequest>,
) -> ApiResult<Json<VignetteResponse>> {
    let created_at = match request.created_at.as_deref() {
        Some(raw) => Some(
            parse_client_datetime(raw)
                .ok_or_else(|| ApiError::BadRequest("Invalid date format".to_string()))?,
        ),
        None => None,
    };
    let title = match request.title.as_deref() {
        Some(title) => Some(required_title(title)?.to_string()),
        None => None,
    };

    let patch = VignettePatch {
        title,
        content: request.content,
        created_at,
    };
    let vignette = vignettes::patch(&state.db, id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Vignette"))?;

    info!("Vignette {} patched by admin '{}'", id, admin.username);
    Ok(Json(with_photos(&state, vignette).await?))
}

/// DELETE /api/vignettes/:id (admin)
pub async fn delete_vignette(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    if !vignettes::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Vignette"));
    }

    info!("Vignette {} deleted by admin '{}'", id, admin.username);
    Ok(message("Vignette deleted"))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/vignettes",
            get(list_vignettes).post(create_vignette),
        )
        .route(
            "/api/vignettes/:id",
            get(get_vignette)
                .put(update_vignette)
                .patch(patch_vignette)
                .delete(delete_vignette),
        )
}
