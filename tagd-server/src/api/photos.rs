//! Photo endpoints

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tagd_common::db::{Photo, UserRecord};
use tagd_common::time::parse_client_datetime;
use tracing::{info, warn};

use super::{
    bytes_response, can_read, message, owner_filter, AdminUser, CurrentUser, MessageResponse,
    UploadForm,
};
use crate::db::photos::{self, NewPhoto, PhotoChanges};
use crate::error::{ApiError, ApiResult};
use crate::media;
use crate::pagination::ListQuery;
use crate::storage::PHOTOS_FOLDER;
use crate::AppState;

/// Photo plus a URL the browser can load it from
#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    #[serde(flatten)]
    pub photo: Photo,
    pub url: String,
}

impl PhotoResponse {
    pub fn new(state: &AppState, photo: Photo) -> Self {
        let url = state
            .store
            .public_url(&photo.file_path, PHOTOS_FOLDER, &photo.filename)
            .unwrap_or_else(|| format!("/api/photos/{}", photo.id));
        Self { photo, url }
    }
}

#[derive(Debug, Deserialize)]
pub struct PhotoUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub taken_at: Option<String>,
}

/// One entry of a reorder request
#[derive(Debug, Deserialize)]
pub struct SortOrderItem {
    pub id: i64,
    pub sort_order: i64,
}

/// Load a photo `user` may see; others' photos are reported missing
pub(crate) async fn load_visible_photo(
    state: &AppState,
    user: &UserRecord,
    id: i64,
) -> ApiResult<Photo> {
    photos::get(&state.db, id)
        .await?
        .filter(|photo| can_read(user, photo.uploaded_by_id))
        .ok_or_else(|| ApiError::not_found("Photo"))
}

/// The ids in `ids` naming photos `user` may see, in order
pub(crate) async fn visible_photo_ids(
    state: &AppState,
    user: &UserRecord,
    ids: &[i64],
) -> ApiResult<Vec<i64>> {
    if user.is_admin {
        return Ok(ids.to_vec());
    }
    let mut visible = Vec::with_capacity(ids.len());
    for &id in ids {
        if let Some(photo) = photos::get(&state.db, id).await? {
            if can_read(user, photo.uploaded_by_id) {
                visible.push(id);
            }
        }
    }
    Ok(visible)
}

/// Convert HEIC uploads to JPEG when this build supports it
///
/// Returns the bytes to store and their extension.
async fn normalize_image(original_name: &str, data: Vec<u8>) -> ApiResult<(Vec<u8>, String)> {
    let ext = media::file_extension(original_name);
    if !media::is_heic(original_name) {
        return Ok((data, ext));
    }

    #[cfg(feature = "heic")]
    {
        let jpeg = tokio::task::spawn_blocking(move || media::convert_heic_to_jpeg(&data))
            .await
            .map_err(|e| ApiError::Internal(format!("Conversion task failed: {}", e)))??;
        info!("Converted HEIC upload '{}' to JPEG", original_name);
        Ok((jpeg, ".jpg".to_string()))
    }

    #[cfg(not(feature = "heic"))]
    {
        warn!(
            "HEIC upload '{}' stored unconverted (built without `heic` feature)",
            original_name
        );
        Ok((data, ext))
    }
}

/// POST /api/photos
///
/// Multipart: `file`, optional `title` and `description`.
pub async fn upload_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut form: UploadForm,
) -> ApiResult<Json<PhotoResponse>> {
    let file = form.require_file()?;
    let original_name = file
        .file_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "photo".to_string());

    // EXIF is read before any conversion
    let taken_at = media::extract_taken_at(&file.data);

    let (data, ext) = normalize_image(&original_name, file.data.to_vec()).await?;
    let filename = media::unique_filename(&ext);
    let content_type = media::mime_from_filename(&filename);

    let location = state
        .store
        .put(PHOTOS_FOLDER, &filename, &data, Some(content_type))
        .await?;

    let title = form.text_owned("title").unwrap_or_else(|| original_name.clone());
    let new_photo = NewPhoto {
        filename: &filename,
        file_path: &location,
        title: Some(&title),
        description: form.text("description"),
        uploaded_by_id: user.id,
        taken_at,
    };

    let photo = match photos::insert(&state.db, &new_photo).await {
        Ok(photo) => photo,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&location).await {
                warn!("Could not remove orphaned upload {}: {}", location, cleanup);
            }
            return Err(e.into());
        }
    };

    info!(
        "Photo {} uploaded by '{}' ({} bytes, {})",
        photo.id,
        user.username,
        data.len(),
        state.store.backend_name()
    );
    Ok(Json(PhotoResponse::new(&state, photo)))
}

/// GET /api/photos?skip=&limit=
pub async fn list_photos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<PhotoResponse>>> {
    let photos = photos::list(&state.db, owner_filter(&user), query.window()).await?;
    Ok(Json(
        photos
            .into_iter()
            .map(|p| PhotoResponse::new(&state, p))
            .collect(),
    ))
}

/// GET /api/photos/:id
///
/// The image bytes.
pub async fn get_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let photo = load_visible_photo(&state, &user, id).await?;

    let data = state.store.read(&photo.file_path).await?;
    let content_type = media::sniff_mime(&data, media::mime_from_filename(&photo.filename));
    Ok(bytes_response(data, &content_type))
}

/// PUT /api/photos/:id (admin)
pub async fn update_photo(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<PhotoUpdateRequest>,
) -> ApiResult<Json<PhotoResponse>> {
    let taken_at = match request.taken_at.as_deref() {
        Some(raw) => Some(
            parse_client_datetime(raw)
                .ok_or_else(|| ApiError::BadRequest("Invalid date format".to_string()))?,
        ),
        None => None,
    };

    let changes = PhotoChanges {
        title: request.title,
        description: request.description,
        taken_at,
    };
    let photo = photos::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Photo"))?;

    info!("Photo {} updated by admin '{}'", id, admin.username);
    Ok(Json(PhotoResponse::new(&state, photo)))
}

/// DELETE /api/photos/:id (admin)
///
/// A storage failure is logged; the database row is removed regardless.
pub async fn delete_photo(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let photo = photos::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Photo"))?;

    match state.store.delete(&photo.file_path).await {
        Ok(true) => info!("Deleted stored photo {}", photo.file_path),
        Ok(false) => warn!("Stored photo already missing: {}", photo.file_path),
        Err(e) => warn!("Could not delete stored photo {}: {}", photo.file_path, e),
    }

    photos::delete(&state.db, id).await?;
    info!("Photo {} deleted by admin '{}'", id, admin.username);
    Ok(message("Photo deleted successfully"))
}

/// POST /api/photos/reorder (admin)
pub async fn reorder_photos(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(items): Json<Vec<SortOrderItem>>,
) -> ApiResult<Json<MessageResponse>> {
    let order: Vec<(i64, i64)> = items.iter().map(|i| (i.id, i.sort_order)).collect();
    let updated = photos::reorder(&state.db, &order).await?;

    info!("{} photos reordered by admin '{}'", updated, admin.username);
    Ok(message(format!("Reordered {} photos", updated)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/photos", get(list_photos).post(upload_photo))
        .route("/api/photos/reorder", post(reorder_photos))
        .route(
            "/api/photos/:id",
            get(get_photo).put(update_photo).delete(delete_photo),
        )
}
