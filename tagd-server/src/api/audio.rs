//! Audio recording endpoints

use axum::{
    extract::{Path, State},
    http::header,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tagd_common::db::AudioRecording;
use tagd_common::time::parse_client_datetime;
use tracing::{error, info, warn};

use super::{
    bytes_response_with_headers, can_read, message, owner_filter, AdminUser, CurrentUser,
    MessageResponse, UploadForm,
};
use crate::db::audio::{self, AudioChanges};
use crate::error::{ApiError, ApiResult};
use crate::media;
use crate::storage::AUDIO_FOLDER;
use crate::AppState;

/// Recording plus the URL it streams from
#[derive(Debug, Serialize)]
pub struct AudioResponse {
    #[serde(flatten)]
    pub recording: AudioRecording,
    pub url: String,
}

impl From<AudioRecording> for AudioResponse {
    fn from(recording: AudioRecording) -> Self {
        Self {
            url: format!("/api/audio/{}", recording.id),
            recording,
        }
    }
}

/// POST /api/audio
///
/// Multipart: `file`, optional `title` and `description`. The title falls
/// back to the uploaded file name, then to a timestamp.
pub async fn upload_audio(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut form: UploadForm,
) -> ApiResult<Json<AudioResponse>> {
    let file = form.require_file()?;
    let ext = media::audio_extension(file.file_name.as_deref(), file.content_type.as_deref());
    let filename = media::unique_filename(&ext);

    let location = state
        .store
        .put(AUDIO_FOLDER, &filename, &file.data, file.content_type.as_deref())
        .await?;

    let title = form
        .text_owned("title")
        .or_else(|| file.file_name.clone().filter(|n| !n.trim().is_empty()))
        .unwrap_or_else(|| {
            format!("Recording {}", tagd_common::time::now().format("%Y-%m-%d %H:%M"))
        });

    let recording = match audio::insert(
        &state.db,
        &filename,
        &location,
        &title,
        form.text("description"),
        user.id,
    )
    .await
    {
        Ok(recording) => recording,
        Err(e) => {
            error!("Failed to save audio recording: {}", e);
            if let Err(cleanup) = state.store.delete(&location).await {
                warn!("Could not remove orphaned upload {}: {}", location, cleanup);
            }
            return Err(ApiError::Internal(
                "Failed to save audio recording".to_string(),
            ));
        }
    };

    info!(
        "Audio {} uploaded by '{}' ({} bytes)",
        recording.id,
        user.username,
        file.data.len()
    );
    Ok(Json(recording.into()))
}

/// GET /api/audio
pub async fn list_audio(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<AudioResponse>>> {
    let recordings = audio::list(&state.db, owner_filter(&user)).await?;
    Ok(Json(recordings.into_iter().map(AudioResponse::from).collect()))
}

/// GET /api/audio/:id
///
/// Recording bytes; browsers must not cache them since edits reuse the id.
pub async fn get_audio(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let recording = audio::get(&state.db, id)
        .await?
        .filter(|recording| can_read(&user, recording.author_id))
        .ok_or_else(|| ApiError::not_found("Audio recording"))?;

    let data = state.store.read(&recording.file_path).await?;
    let content_type = media::sniff_mime(&data, media::mime_from_filename(&recording.filename));

    Ok(bytes_response_with_headers(
        data,
        &content_type,
        &[
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
    ))
}

/// PUT /api/audio/:id (admin)
///
/// Form fields `title`, `description`, `created_at`; absent fields are kept.
pub async fn update_audio(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    form: UploadForm,
) -> ApiResult<Json<AudioResponse>> {
    let created_at = match form.text("created_at") {
        Some(raw) => Some(
            parse_client_datetime(raw)
                .ok_or_else(|| ApiError::BadRequest("Invalid date format".to_string()))?,
        ),
        None => None,
    };

    let changes = AudioChanges {
        title: form.text_owned("title"),
        description: form.text_owned("description"),
        created_at,
    };
    let recording = audio::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Audio recording"))?;

    info!("Audio {} updated by admin '{}'", id, admin.username);
    Ok(Json(recording.into()))
}

/// DELETE /api/audio/:id (admin)
pub async fn delete_audio(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let recording = audio::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Audio recording"))?;

    if let Err(e) = state.store.delete(&recording.file_path).await {
        warn!("Could not delete stored audio {}: {}", recording.file_path, e);
    }

    audio::delete(&state.db, id).await?;
    info!("Audio {} deleted by admin '{}'", id, admin.username);
    Ok(message("Audio recording deleted successfully"))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/audio", get(list_audio).post(upload_audio))
        .route(
            "/api/audio/:id",
            get(get_audio).put(update_audio).delete(delete_audio),
        )
}
