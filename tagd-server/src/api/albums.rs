//! Album endpoints
//!
//! Albums are visible to, and changed by, their creator or an admin. Other
//! members get 404.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tagd_common::db::{Album, UserRecord};
use tracing::{info, warn};

use super::photos::{load_visible_photo, visible_photo_ids, PhotoResponse, SortOrderItem};
use super::{
    bytes_response, can_read, message, owner_filter, AdminUser, CurrentUser, MessageResponse,
    UploadForm,
};
use crate::db::albums;
use crate::error::{ApiError, ApiResult};
use crate::media;
use crate::storage::PHOTOS_FOLDER;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AlbumRequest {
    pub name: String,
    pub description: Option<String>,
    pub photo_ids: Option<Vec<i64>>,
}

/// Album list entry
#[derive(Debug, Serialize)]
pub struct AlbumListItem {
    #[serde(flatten)]
    pub album: Album,
    pub photo_count: i64,
    pub background_url: Option<String>,
}

/// Album with its photos
#[derive(Debug, Serialize)]
pub struct AlbumDetail {
    #[serde(flatten)]
    pub album: Album,
    pub photo_count: usize,
    pub photos: Vec<PhotoResponse>,
    pub background_url: Option<String>,
}

/// Browser URL of an album's background image, if it has one
pub fn background_url(state: &AppState, album: &Album) -> Option<String> {
    let path = album.background_path.as_deref()?;
    let filename = album.background_filename.as_deref().unwrap_or_default();
    Some(
        state
            .store
            .public_url(path, PHOTOS_FOLDER, filename)
            .unwrap_or_else(|| format!("/api/albums/{}/background", album.id)),
    )
}

/// Load an album the user created (any album for admins)
async fn load_album(state: &AppState, user: &UserRecord, id: i64) -> ApiResult<Album> {
    albums::get(&state.db, id)
        .await?
        .filter(|album| can_read(user, album.created_by_id))
        .ok_or_else(|| ApiError::not_found("Album"))
}

/// POST /api/albums
pub async fn create_album(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<AlbumRequest>,
) -> ApiResult<Json<Album>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Album name is required".to_string()));
    }

    let photo_ids = visible_photo_ids(
        &state,
        &user,
        request.photo_ids.as_deref().unwrap_or_default(),
    )
    .await?;
    let album = albums::create(
        &state.db,
        user.id,
        name,
        request.description.as_deref(),
        &photo_ids,
    )
    .await?;

    info!("Album {} '{}' created by '{}'", album.id, album.name, user.username);
    Ok(Json(album))
}

/// GET /api/albums
pub async fn list_albums(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<AlbumListItem>>> {
    let items = albums::list(&state.db, owner_filter(&user))
        .await?
        .into_iter()
        .map(|summary| AlbumListItem {
            background_url: background_url(&state, &summary.album),
            photo_count: summary.photo_count,
            album: summary.album,
        })
        .collect();
    Ok(Json(items))
}

/// GET /api/albums/:id
pub async fn get_album(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<AlbumDetail>> {
    let album = load_album(&state, &user, id).await?;
    let photos: Vec<PhotoResponse> = albums::photos(&state.db, id)
        .await?
        .into_iter()
        .map(|p| PhotoResponse::new(&state, p))
        .collect();

    Ok(Json(AlbumDetail {
        background_url: background_url(&state, &album),
        photo_count: photos.len(),
        photos,
        album,
    }))
}

/// POST /api/albums/:id/photos/:photo_id
pub async fn add_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, photo_id)): Path<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    load_album(&state, &user, id).await?;
    load_visible_photo(&state, &user, photo_id).await?;

    if albums::add_photo(&state.db, id, photo_id).await? {
        Ok(message("Photo added to album"))
    } else {
        Ok(message("Photo already in album"))
    }
}

/// DELETE /api/albums/:id/photos/:photo_id
pub async fn remove_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, photo_id)): Path<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    load_album(&state, &user, id).await?;

    if !albums::remove_photo(&state.db, id, photo_id).await? {
        return Err(ApiError::NotFound("Photo not in album".to_string()));
    }
    Ok(message("Photo removed from album"))
}

/// DELETE /api/albums/:id
///
/// Photos stay in the gallery; only the album and its links go.
pub async fn delete_album(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let album = load_album(&state, &user, id).await?;

    if let Some(path) = album.background_path.as_deref() {
        if let Err(e) = state.store.delete(path).await {
            warn!("Could not delete album background {}: {}", path, e);
        }
    }

    albums::delete(&state.db, id).await?;
    info!("Album {} deleted by '{}'", id, user.username);
    Ok(message("Album deleted successfully"))
}

/// POST /api/albums/:id/background
///
/// Multipart `file` (image). Replaces any previous background.
pub async fn upload_background(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    mut form: UploadForm,
) -> ApiResult<Json<AlbumListItem>> {
    let album = load_album(&state, &user, id).await?;
    let file = form.require_file()?;

    let is_image = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"));
    if !is_image {
        return Err(ApiError::BadRequest("File must be an image".to_string()));
    }

    let ext = file
        .file_name
        .as_deref()
        .map(media::file_extension)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| ".jpg".to_string());
    let filename = format!("album_bg_{}", media::unique_filename(&ext));

    let location = state
        .store
        .put(PHOTOS_FOLDER, &filename, &file.data, file.content_type.as_deref())
        .await?;

    let updated = albums::set_background(&state.db, id, &filename, &location)
        .await?
        .ok_or_else(|| ApiError::not_found("Album"))?;

    if let Some(old) = album.background_path.as_deref() {
        if let Err(e) = state.store.delete(old).await {
            warn!("Could not delete previous album background {}: {}", old, e);
        }
    }

    let photo_count = albums::photos(&state.db, id).await?.len() as i64;
    info!("Album {} background set by '{}'", id, user.username);
    Ok(Json(AlbumListItem {
        background_url: background_url(&state, &updated),
        photo_count,
        album: updated,
    }))
}

/// GET /api/albums/:id/background
pub async fn get_background(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let album = load_album(&state, &user, id).await?;
    let path = album
        .background_path
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("Album has no background".to_string()))?;

    let data = state.store.read(path).await?;
    let fallback = media::mime_from_filename(album.background_filename.as_deref().unwrap_or(path));
    let content_type = media::sniff_mime(&data, fallback);
    Ok(bytes_response(data, &content_type))
}

/// POST /api/albums/reorder (admin)
pub async fn reorder_albums(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(items): Json<Vec<SortOrderItem>>,
) -> ApiResult<Json<MessageResponse>> {
    let order: Vec<(i64, i64)> = items.iter().map(|i| (i.id, i.sort_order)).collect();
    let updated = albums::reorder(&state.db, &order).await?;

    info!("{} albums reordered by admin '{}'", updated, admin.username);
    Ok(message(format!("Reordered {} albums", updated)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/albums", get(list_albums).post(create_album))
        .route("/api/albums/reorder", post(reorder_albums))
        .route("/api/albums/:id", get(get_album).delete(delete_album))
        .route(
            "/api/albums/:id/photos/:photo_id",
            post(add_photo).delete(remove_photo),
        )
        .route(
            "/api/albums/:id/background",
            get(get_background).post(upload_background),
        )
}
