//! Album persistence

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tagd_common::db::{Album, Photo};
use tagd_common::Result;

const ALBUM_COLUMNS: &str = "id, name, description, created_by_id, background_filename, background_path, sort_order, created_at";

/// Album with its photo count
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlbumSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub album: Album,
    pub photo_count: i64,
}

/// Create an album, linking the photos in `photo_ids` that exist
pub async fn create(
    pool: &SqlitePool,
    created_by_id: i64,
    name: &str,
    description: Option<&str>,
    photo_ids: &[i64],
) -> Result<Album> {
    let mut tx = pool.begin().await?;
    let now = tagd_common::time::now();

    let album = sqlx::query_as::<_, Album>(&format!(
        r#"
        INSERT INTO albums (name, description, created_by_id, sort_order, created_at)
        VALUES (?, ?, ?, 0, ?)
        RETURNING {}
        "#,
        ALBUM_COLUMNS
    ))
    .bind(name)
    .bind(description)
    .bind(created_by_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for photo_id in photo_ids {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO album_photos (album_id, photo_id, added_at)
            SELECT ?, id, ? FROM photos WHERE id = ?
            "#,
        )
        .bind(album.id)
        .bind(now)
        .bind(photo_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(album)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Album>> {
    let album = sqlx::query_as::<_, Album>(&format!(
        "SELECT {} FROM albums WHERE id = ?",
        ALBUM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(album)
}

/// Albums in display order with photo counts, optionally by one creator
pub async fn list(pool: &SqlitePool, creator: Option<i64>) -> Result<Vec<AlbumSummary>> {
    let albums = sqlx::query_as::<_, AlbumSummary>(
        r#"
        SELECT a.id, a.name, a.description, a.created_by_id, a.background_filename,
               a.background_path, a.sort_order, a.created_at,
               (SELECT COUNT(*) FROM album_photos ap WHERE ap.album_id = a.id) AS photo_count
        FROM albums a
        WHERE (? IS NULL OR a.created_by_id = ?)
        ORDER BY a.sort_order ASC, a.created_at DESC, a.id DESC
        "#,
    )
    .bind(creator)
    .bind(creator)
    .fetch_all(pool)
    .await?;

    Ok(albums)
}

pub async fn list_by_creator(pool: &SqlitePool, user_id: i64) -> Result<Vec<Album>> {
    let albums = sqlx::query_as::<_, Album>(&format!(
        "SELECT {} FROM albums WHERE created_by_id = ?",
        ALBUM_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(albums)
}

/// Photos in an album, in the order they were added
pub async fn photos(pool: &SqlitePool, album_id: i64) -> Result<Vec<Photo>> {
    let photos = sqlx::query_as::<_, Photo>(
        r#"
        SELECT p.id, p.filename, p.file_path, p.title, p.description, p.uploaded_by_id,
               p.taken_at, p.sort_order, p.created_at
        FROM album_photos ap
        JOIN photos p ON p.id = ap.photo_id
        WHERE ap.album_id = ?
        ORDER BY ap.added_at, ap.id
        "#,
    )
    .bind(album_id)
    .fetch_all(pool)
    .await?;

    Ok(photos)
}

/// Link a photo; false when it was already in the album
pub async fn add_photo(pool: &SqlitePool, album_id: i64, photo_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO album_photos (album_id, photo_id, added_at) VALUES (?, ?, ?)",
    )
    .bind(album_id)
    .bind(photo_id)
    .bind(tagd_common::time::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Unlink a photo; false when it was not in the album
pub async fn remove_photo(pool: &SqlitePool, album_id: i64, photo_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM album_photos WHERE album_id = ? AND photo_id = ?")
        .bind(album_id)
        .bind(photo_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_background(
    pool: &SqlitePool,
    id: i64,
    filename: &str,
    path: &str,
) -> Result<Option<Album>> {
    let album = sqlx::query_as::<_, Album>(&format!(
        "UPDATE albums SET background_filename = ?, background_path = ? WHERE id = ? RETURNING {}",
        ALBUM_COLUMNS
    ))
    .bind(filename)
    .bind(path)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(album)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM albums WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Set `sort_order` for each `(id, sort_order)` pair in one transaction
pub async fn reorder(pool: &SqlitePool, order: &[(i64, i64)]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for (id, sort_order) in order {
        let result = sqlx::query("UPDATE albums SET sort_order = ? WHERE id = ?")
            .bind(sort_order)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        updated += result.rows_affected();
    }

    tx.commit().await?;
    Ok(updated)
}
