//! Generic file persistence
//!
//! `source` records which page a file was uploaded from: the Files page
//! (`files`) or as a vignette attachment (`vignettes`).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tagd_common::db::StoredFile;
use tagd_common::Result;

/// Files uploaded from the Files page
pub const SOURCE_FILES: &str = "files";
/// Files uploaded as vignette attachments
pub const SOURCE_VIGNETTES: &str = "vignettes";

const FILE_COLUMNS: &str =
    "id, filename, file_path, title, description, file_type, source, uploaded_by_id, created_at";

/// Whether `source` is a value the `files.source` column accepts
pub fn is_valid_source(source: &str) -> bool {
    source == SOURCE_FILES || source == SOURCE_VIGNETTES
}

/// Fields for a new file row
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub filename: &'a str,
    pub file_path: &'a str,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub file_type: Option<&'a str>,
    pub source: &'a str,
    pub uploaded_by_id: i64,
}

/// Editable file metadata; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct FileChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

pub async fn insert(pool: &SqlitePool, file: &NewFile<'_>) -> Result<StoredFile> {
    let stored = sqlx::query_as::<_, StoredFile>(&format!(
        r#"
        INSERT INTO files (filename, file_path, title, description, file_type, source, uploaded_by_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        FILE_COLUMNS
    ))
    .bind(file.filename)
    .bind(file.file_path)
    .bind(file.title)
    .bind(file.description)
    .bind(file.file_type)
    .bind(file.source)
    .bind(file.uploaded_by_id)
    .bind(tagd_common::time::now())
    .fetch_one(pool)
    .await?;

    Ok(stored)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<StoredFile>> {
    let file = sqlx::query_as::<_, StoredFile>(&format!(
        "SELECT {} FROM files WHERE id = ?",
        FILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(file)
}

/// Files newest first, optionally only one source and one uploader
pub async fn list(
    pool: &SqlitePool,
    source: Option<&str>,
    uploader: Option<i64>,
) -> Result<Vec<StoredFile>> {
    let files = sqlx::query_as::<_, StoredFile>(&format!(
        r#"
        SELECT {} FROM files
        WHERE (? IS NULL OR source = ?)
          AND (? IS NULL OR uploaded_by_id = ?)
        ORDER BY created_at DESC, id DESC
        "#,
        FILE_COLUMNS
    ))
    .bind(source)
    .bind(source)
    .bind(uploader)
    .bind(uploader)
    .fetch_all(pool)
    .await?;

    Ok(files)
}

pub async fn list_by_uploader(pool: &SqlitePool, user_id: i64) -> Result<Vec<StoredFile>> {
    let files = sqlx::query_as::<_, StoredFile>(&format!(
        "SELECT {} FROM files WHERE uploaded_by_id = ?",
        FILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(files)
}

pub async fn update(pool: &SqlitePool, id: i64, changes: &FileChanges) -> Result<Option<StoredFile>> {
    let file = sqlx::query_as::<_, StoredFile>(&format!(
        r#"
        UPDATE files SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            created_at = COALESCE(?, created_at)
        WHERE id = ?
        RETURNING {}
        "#,
        FILE_COLUMNS
    ))
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.created_at)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(file)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM files WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Move every file tagged `from` to `to`, returning how many changed
pub async fn retag_source(pool: &SqlitePool, from: &str, to: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE files SET source = ? WHERE source = ?")
        .bind(to)
        .bind(from)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sources() {
        assert!(is_valid_source("files"));
        assert!(is_valid_source("vignettes"));
        assert!(!is_valid_source("photos"));
        assert!(!is_valid_source(""));
    }
}
