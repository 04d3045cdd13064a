//! People and photo tagging endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tagd_common::db::Person;
use tracing::info;

use super::{message, CurrentUser, MessageResponse};
use super::photos::load_visible_photo;
use crate::db::people;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PersonRequest {
    pub name: String,
}

/// GET /api/people
pub async fn list_people(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<Person>>> {
    Ok(Json(people::list(&state.db).await?))
}

/// POST /api/people
pub async fn create_person(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<PersonRequest>,
) -> ApiResult<Json<Person>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }

    let person = people::create(&state.db, name).await?;
    info!("Person {} '{}' added by '{}'", person.id, person.name, user.username);
    Ok(Json(person))
}

/// GET /api/photos/:id/people
pub async fn photo_people(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(photo_id): Path<i64>,
) -> ApiResult<Json<Vec<Person>>> {
    load_visible_photo(&state, &user, photo_id).await?;
    Ok(Json(people::for_photo(&state.db, photo_id).await?))
}

/// POST /api/photos/:id/people/:person_id
pub async fn tag_person(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((photo_id, person_id)): Path<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    load_visible_photo(&state, &user, photo_id).await?;
    if people::get(&state.db, person_id).await?.is_none() {
        return Err(ApiError::not_found("Person"));
    }

    if people::tag(&state.db, photo_id, person_id).await? {
        Ok(message("Person tagged in photo"))
    } else {
        Ok(message("Person already tagged in photo"))
    }
}

/// DELETE /api/photos/:id/people/:person_id
pub async fn untag_person(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((photo_id, person_id)): Path<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    load_visible_photo(&state, &user, photo_id).await?;
    if !people::untag(&state.db, photo_id, person_id).await? {
        return Err(ApiError::NotFound("Person not tagged in photo".to_string()));
    }
    Ok(message("Person removed from photo"))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/people", get(list_people).post(create_person))
        .route("/api/photos/:id/people", get(photo_people))
        .route(
            "/api/photos/:id/people/:person_id",
            post(tag_person).delete(untag_person),
        )
}
