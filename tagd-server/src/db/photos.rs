//! Photo persistence

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tagd_common::db::Photo;
use tagd_common::Result;

use crate::pagination::Window;

const PHOTO_COLUMNS: &str =
    "id, filename, file_path, title, description, uploaded_by_id, taken_at, sort_order, created_at";

/// Fields for a new photo
#[derive(Debug, Clone)]
pub struct NewPhoto<'a> {
    pub filename: &'a str,
    pub file_path: &'a str,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub uploaded_by_id: i64,
    pub taken_at: Option<DateTime<Utc>>,
}

/// Editable photo metadata; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct PhotoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
}

pub async fn insert(pool: &SqlitePool, photo: &NewPhoto<'_>) -> Result<Photo> {
    let photo = sqlx::query_as::<_, Photo>(&format!(
        r#"
        INSERT INTO photos (filename, file_path, title, description, uploaded_by_id, taken_at, sort_order, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?)
        RETURNING {}
        "#,
        PHOTO_COLUMNS
    ))
    .bind(photo.filename)
    .bind(photo.file_path)
    .bind(photo.title)
    .bind(photo.description)
    .bind(photo.uploaded_by_id)
    .bind(photo.taken_at)
    .bind(tagd_common::time::now())
    .fetch_one(pool)
    .await?;

    Ok(photo)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Photo>> {
    let photo = sqlx::query_as::<_, Photo>(&format!(
        "SELECT {} FROM photos WHERE id = ?",
        PHOTO_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(photo)
}

/// Gallery order: manual `sort_order` first, then newest
///
/// `owner` limits the listing to one uploader; `None` lists everyone's.
pub async fn list(pool: &SqlitePool, owner: Option<i64>, window: Window) -> Result<Vec<Photo>> {
    let photos = sqlx::query_as::<_, Photo>(&format!(
        r#"
        SELECT {} FROM photos
        WHERE (? IS NULL OR uploaded_by_id = ?)
        ORDER BY sort_order ASC, created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        PHOTO_COLUMNS
    ))
    .bind(owner)
    .bind(owner)
    .bind(window.limit)
    .bind(window.offset)
    .fetch_all(pool)
    .await?;

    Ok(photos)
}

/// Every photo, oldest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Photo>> {
    let photos = sqlx::query_as::<_, Photo>(&format!(
        "SELECT {} FROM photos ORDER BY id",
        PHOTO_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(photos)
}

pub async fn list_by_uploader(pool: &SqlitePool, user_id: i64) -> Result<Vec<Photo>> {
    let photos = sqlx::query_as::<_, Photo>(&format!(
        "SELECT {} FROM photos WHERE uploaded_by_id = ?",
        PHOTO_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(photos)
}

/// Photos whose uploader no longer exists (only possible with foreign keys off)
pub async fn list_orphaned(pool: &SqlitePool) -> Result<Vec<Photo>> {
    let photos = sqlx::query_as::<_, Photo>(&format!(
        "SELECT {} FROM photos WHERE uploaded_by_id NOT IN (SELECT id FROM users) ORDER BY id",
        PHOTO_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(photos)
}

/// Apply metadata changes, returning the updated row
pub async fn update(pool: &SqlitePool, id: i64, changes: &PhotoChanges) -> Result<Option<Photo>> {
    let photo = sqlx::query_as::<_, Photo>(&format!(
        r#"
        UPDATE photos SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            taken_at = COALESCE(?, taken_at)
        WHERE id = ?
        RETURNING {}
        "#,
        PHOTO_COLUMNS
    ))
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.taken_at)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(photo)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM photos WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Set `sort_order` for each `(id, sort_order)` pair in one transaction
///
/// Returns the number of photos updated; unknown ids are skipped.
pub async fn reorder(pool: &SqlitePool, order: &[(i64, i64)]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for (id, sort_order) in order {
        let result = sqlx::query("UPDATE photos SET sort_order = ? WHERE id = ?")
            .bind(sort_order)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        updated += result.rows_affected();
    }

    tx.commit().await?;
    Ok(updated)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
