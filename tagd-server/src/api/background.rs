//! Site background image
//!
//! Anyone may read the active background (it shows on the login page);
//! only admins replace or delete it.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tagd_common::db::BackgroundImage;
use tracing::{info, warn};

use super::{bytes_response, message, AdminUser, MessageResponse, UploadForm};
use crate::db::backgrounds;
use crate::error::{ApiError, ApiResult};
use crate::media;
use crate::storage::PHOTOS_FOLDER;
use crate::AppState;

/// Active background as the frontend consumes it
#[derive(Debug, Serialize, PartialEq)]
pub struct ActiveBackground {
    pub id: i64,
    pub url: String,
}

/// Browser URL of a background image
pub fn background_url(state: &AppState, background: &BackgroundImage) -> String {
    state
        .store
        .public_url(&background.file_path, PHOTOS_FOLDER, &background.filename)
        .unwrap_or_else(|| "/api/background/image".to_string())
}

/// Stored name for an uploaded background: `bg_<uuid>.<ext>`, `jpg` by default
fn background_filename(original_name: Option<&str>) -> String {
    let ext = original_name
        .map(media::file_extension)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| ".jpg".to_string());
    format!("bg_{}", media::unique_filename(&ext))
}

/// GET /api/background
pub async fn get_active_background(
    State(state): State<AppState>,
) -> ApiResult<Json<Option<ActiveBackground>>> {
    let active = backgrounds::get_active(&state.db).await?;
    Ok(Json(active.map(|bg| ActiveBackground {
        id: bg.id,
        url: background_url(&state, &bg),
    })))
}

/// GET /api/background/image
pub async fn get_background_image(State(state): State<AppState>) -> ApiResult<Response> {
    let background = backgrounds::get_active(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active background".to_string()))?;

    let data = state.store.read(&background.file_path).await?;
    let content_type = media::sniff_mime(&data, media::mime_from_filename(&background.filename));
    Ok(bytes_response(data, &content_type))
}

/// POST /api/admin/background (admin)
///
/// Multipart `file`; the new image becomes the only active background.
pub async fn upload_background(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut form: UploadForm,
) -> ApiResult<Json<BackgroundImage>> {
    let file = form.require_file()?;

    let is_image = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"));
    if !is_image {
        return Err(ApiError::BadRequest(
            "Only image files are allowed".to_string(),
        ));
    }

    let filename = background_filename(file.file_name.as_deref());
    let location = state
        .store
        .put(PHOTOS_FOLDER, &filename, &file.data, file.content_type.as_deref())
        .await?;

    let background = match backgrounds::insert_active(&state.db, &filename, &location, admin.id).await {
        Ok(background) => background,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&location).await {
                warn!("Could not remove orphaned upload {}: {}", location, cleanup);
            }
            return Err(e.into());
        }
    };

    info!("Background {} activated by admin '{}'", background.id, admin.username);
    Ok(Json(background))
}

/// DELETE /api/admin/background/:id (admin)
pub async fn delete_background(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let background = backgrounds::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Background not found".to_string()))?;

    if let Err(e) = state.store.delete(&background.file_path).await {
        warn!("Could not delete stored background {}: {}", background.file_path, e);
    }

    backgrounds::delete(&state.db, id).await?;
    info!("Background {} deleted by admin '{}'", id, admin.username);
    Ok(message("Background deleted"))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/background", get(get_active_background))
        .route("/api/background/image", get(get_background_image))
        .route("/api/admin/background", post(upload_background))
        .route("/api/admin/background/:id", delete(delete_background))
}
