//! Site background images
//!
//! At most one row is active; activating a new image deactivates the rest.

use sqlx::SqlitePool;
use tagd_common::db::BackgroundImage;
use tagd_common::Result;

const BACKGROUND_COLUMNS: &str = "id, filename, file_path, uploaded_by_id, is_active, created_at";

/// Insert a new background and make it the only active one
pub async fn insert_active(
    pool: &SqlitePool,
    filename: &str,
    file_path: &str,
    uploaded_by_id: i64,
) -> Result<BackgroundImage> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE background_images SET is_active = 0 WHERE is_active = 1")
        .execute(&mut *tx)
        .await?;

    let background = sqlx::query_as::<_, BackgroundImage>(&format!(
        r#"
        INSERT INTO background_images (filename, file_path, uploaded_by_id, is_active, created_at)
        VALUES (?, ?, ?, 1, ?)
        RETURNING {}
        "#,
        BACKGROUND_COLUMNS
    ))
    .bind(filename)
    .bind(file_path)
    .bind(uploaded_by_id)
    .bind(tagd_common::time::now())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(background)
}

/// The active background, if any
pub async fn get_active(pool: &SqlitePool) -> Result<Option<BackgroundImage>> {
    let background = sqlx::query_as::<_, BackgroundImage>(&format!(
        "SELECT {} FROM background_images WHERE is_active = 1 ORDER BY created_at DESC, id DESC LIMIT 1",
        BACKGROUND_COLUMNS
    ))
    .fetch_optional(pool)
    .await?;

    Ok(background)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<BackgroundImage>> {
    let background = sqlx::query_as::<_, BackgroundImage>(&format!(
        "SELECT {} FROM background_images WHERE id = ?",
        BACKGROUND_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(background)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM background_images WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
