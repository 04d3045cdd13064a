//! People and photo tags

use sqlx::SqlitePool;
use tagd_common::db::Person;
use tagd_common::Result;

/// Everyone, alphabetically
pub async fn list(pool: &SqlitePool) -> Result<Vec<Person>> {
    let people = sqlx::query_as::<_, Person>(
        "SELECT id, name, created_at FROM people ORDER BY name COLLATE NOCASE, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(people)
}

pub async fn create(pool: &SqlitePool, name: &str) -> Result<Person> {
    let person = sqlx::query_as::<_, Person>(
        "INSERT INTO people (name, created_at) VALUES (?, ?) RETURNING id, name, created_at",
    )
    .bind(name)
    .bind(tagd_common::time::now())
    .fetch_one(pool)
    .await?;

    Ok(person)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Person>> {
    let person = sqlx::query_as::<_, Person>("SELECT id, name, created_at FROM people WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(person)
}

/// People tagged in a photo, alphabetically
pub async fn for_photo(pool: &SqlitePool, photo_id: i64) -> Result<Vec<Person>> {
    let people = sqlx::query_as::<_, Person>(
        r#"
        SELECT pe.id, pe.name, pe.created_at
        FROM photo_people pp
        JOIN people pe ON pe.id = pp.person_id
        WHERE pp.photo_id = ?
        ORDER BY pe.name COLLATE NOCASE, pe.id
        "#,
    )
    .bind(photo_id)
    .fetch_all(pool)
    .await?;

    Ok(people)
}

/// Tag a person in a photo; false when already tagged
pub async fn tag(pool: &SqlitePool, photo_id: i64, person_id: i64) -> Result<bool> {
    let result =
        sqlx::query("INSERT OR IGNORE INTO photo_people (photo_id, person_id) VALUES (?, ?)")
            .bind(photo_id)
            .bind(person_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a tag; false when it did not exist
pub async fn untag(pool: &SqlitePool, photo_id: i64, person_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM photo_people WHERE photo_id = ? AND person_id = ?")
        .bind(photo_id)
        .bind(person_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
