//! Audio recording persistence

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tagd_common::db::AudioRecording;
use tagd_common::Result;

const AUDIO_COLUMNS: &str =
    "id, filename, file_path, title, description, author_id, duration_seconds, created_at";

/// Editable recording metadata; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct AudioChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

pub async fn insert(
    pool: &SqlitePool,
    filename: &str,
    file_path: &str,
    title: &str,
    description: Option<&str>,
    author_id: i64,
) -> Result<AudioRecording> {
    let recording = sqlx::query_as::<_, AudioRecording>(&format!(
        r#"
        INSERT INTO audio_recordings (filename, file_path, title, description, author_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        AUDIO_COLUMNS
    ))
    .bind(filename)
    .bind(file_path)
    .bind(title)
    .bind(description)
    .bind(author_id)
    .bind(tagd_common::time::now())
    .fetch_one(pool)
    .await?;

    Ok(recording)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<AudioRecording>> {
    let recording = sqlx::query_as::<_, AudioRecording>(&format!(
        "SELECT {} FROM audio_recordings WHERE id = ?",
        AUDIO_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(recording)
}

/// Recordings newest first, optionally by one author
pub async fn list(pool: &SqlitePool, author: Option<i64>) -> Result<Vec<AudioRecording>> {
    let recordings = sqlx::query_as::<_, AudioRecording>(&format!(
        "SELECT {} FROM audio_recordings WHERE (? IS NULL OR author_id = ?) ORDER BY created_at DESC, id DESC",
        AUDIO_COLUMNS
    ))
    .bind(author)
    .bind(author)
    .fetch_all(pool)
    .await?;

    Ok(recordings)
}

pub async fn list_by_author(pool: &SqlitePool, user_id: i64) -> Result<Vec<AudioRecording>> {
    let recordings = sqlx::query_as::<_, AudioRecording>(&format!(
        "SELECT {} FROM audio_recordings WHERE author_id = ?",
        AUDIO_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(recordings)
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    changes: &AudioChanges,
) -> Result<Option<AudioRecording>> {
    let recording = sqlx::query_as::<_, AudioRecording>(&format!(
        r#"
        UPDATE audio_recordings SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            created_at = COALESCE(?, created_at)
        WHERE id = ?
        RETURNING {}
        "#,
        AUDIO_COLUMNS
    ))
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.created_at)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(recording)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM audio_recordings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
