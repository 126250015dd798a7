use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::types::Feedback;

const COLUMNS: &str = "id, presentation_id, content, created_at, is_processed, ai_response";

pub async fn create(
    pool: &PgPool,
    presentation_id: i64,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Feedback, sqlx::Error> {
    sqlx::query_as::<_, Feedback>(&format!(
        "INSERT INTO feedback (presentation_id, content, created_at) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
    ))
    .bind(presentation_id)
    .bind(content)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// All feedback for a presentation, newest first.
pub async fn find_by_presentation(pool: &PgPool, presentation_id: i64) -> Result<Vec<Feedback>, sqlx::Error> {
    sqlx::query_as::<_, Feedback>(&format!(
        "SELECT {COLUMNS} FROM feedback WHERE presentation_id = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(presentation_id)
    .fetch_all(pool)
    .await
}

/// Mark the given items processed and attach the briefing they were answered with.
/// Items already processed are left alone.
pub async fn mark_processed(conn: &mut PgConnection, ids: &[i64], ai_response: &str) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE feedback SET is_processed = TRUE, ai_response = $2 WHERE id = ANY($1) AND NOT is_processed",
    )
    .bind(ids)
    .bind(ai_response)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
