//! Vignette persistence
//!
//! A vignette links to photos through `vignette_photos`, ordered by
//! `position` (the order the client listed them).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tagd_common::db::Vignette;
use tagd_common::Result;

const VIGNETTE_COLUMNS: &str = "id, title, content, author_id, created_at, updated_at";

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct VignettePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Replace the photo links of a vignette
///
/// Ids that do not name an existing photo are skipped; positions follow the
/// order of `photo_ids`.
async fn replace_photo_links(
    conn: &mut SqliteConnection,
    vignette_id: i64,
    photo_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM vignette_photos WHERE vignette_id = ?")
        .bind(vignette_id)
        .execute(&mut *conn)
        .await?;

    let mut position = 0i64;
    for photo_id in photo_ids {
        let result = sqlx::query(
            r#"
            INSERT INTO vignette_photos (vignette_id, photo_id, position)
            SELECT ?, id, ? FROM photos WHERE id = ?
            "#,
        )
        .bind(vignette_id)
        .bind(position)
        .bind(photo_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            position += 1;
        }
    }

    Ok(())
}

pub async fn create(
    pool: &SqlitePool,
    author_id: i64,
    title: &str,
    content: Option<&str>,
    photo_ids: &[i64],
) -> Result<Vignette> {
    let mut tx = pool.begin().await?;

    let vignette = sqlx::query_as::<_, Vignette>(&format!(
        r#"
        INSERT INTO vignettes (title, content, author_id, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING {}
        "#,
        VIGNETTE_COLUMNS
    ))
    .bind(title)
    .bind(content)
    .bind(author_id)
    .bind(tagd_common::time::now())
    .fetch_one(&mut *tx)
    .await?;

    replace_photo_links(&mut tx, vignette.id, photo_ids).await?;

    tx.commit().await?;
    Ok(vignette)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Vignette>> {
    let vignette = sqlx::query_as::<_, Vignette>(&format!(
        "SELECT {} FROM vignettes WHERE id = ?",
        VIGNETTE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(vignette)
}

/// Vignettes newest first, optionally by one author
pub async fn list(pool: &SqlitePool, author: Option<i64>) -> Result<Vec<Vignette>> {
    let vignettes = sqlx::query_as::<_, Vignette>(&format!(
        "SELECT {} FROM vignettes WHERE (? IS NULL OR author_id = ?) ORDER BY created_at DESC, id DESC",
        VIGNETTE_COLUMNS
    ))
    .bind(author)
    .bind(author)
    .fetch_all(pool)
    .await?;

    Ok(vignettes)
}

/// Linked photo ids in position order
pub async fn photo_ids(pool: &SqlitePool, vignette_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT photo_id FROM vignette_photos WHERE vignette_id = ? ORDER BY position, id",
    )
    .bind(vignette_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Full replacement of title and content; photo links replaced when given
pub async fn replace(
    pool: &SqlitePool,
    id: i64,
    title: &str,
    content: Option<&str>,
    photo_ids: Option<&[i64]>,
) -> Result<Option<Vignette>> {
    let mut tx = pool.begin().await?;

    let vignette = sqlx::query_as::<_, Vignette>(&format!(
        "UPDATE vignettes SET title = ?, content = ?, updated_at = ? WHERE id = ? RETURNING {}",
        VIGNETTE_COLUMNS
    ))
    .bind(title)
    .bind(content)
    .bind(tagd_common::time::now())
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    if vignette.is_some() {
        if let Some(photo_ids) = photo_ids {
            replace_photo_links(&mut tx, id, photo_ids).await?;
        }
    }

    tx.commit().await?;
    Ok(vignette)
}

pub async fn patch(pool: &SqlitePool, id: i64, patch: &VignettePatch) -> Result<Option<Vignette>> {
    let vignette = sqlx::query_as::<_, Vignette>(&format!(
        r#"
        UPDATE vignettes SET
            title = COALESCE(?, title),
            content = COALESCE(?, content),
            created_at = COALESCE(?, created_at),
            updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        VIGNETTE_COLUMNS
    ))
    .bind(patch.title.as_deref())
    .bind(patch.content.as_deref())
    .bind(patch.created_at)
    .bind(tagd_common::time::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(vignette)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM vignettes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
