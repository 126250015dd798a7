use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgPool;

use super::types::*;
use crate::models::feedback;

const COLUMNS: &str = "id, title, description, context, content, access_code, creator_id, created_at, \
     cached_ai_content, last_updated, processing_scheduled, next_processing_time, \
     claim_epoch, claimed_until, failed_attempts, last_error_message, last_error_time";

/// Random 8-char lowercase hex code used in the public share link.
pub fn generate_access_code() -> String {
    let bytes: [u8; 4] = rand::rng().random();
    hex::encode(bytes)
}

pub async fn create(pool: &PgPool, new: &NewPresentation) -> Result<Presentation, sqlx::Error> {
    let sql = format!(
        "INSERT INTO presentations (title, description, context, content, access_code, creator_id) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}"
    );

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = sqlx::query_as::<_, Presentation>(&sql)
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.context)
            .bind(&new.content)
            .bind(generate_access_code())
            .bind(new.creator_id)
            .fetch_one(pool)
            .await;

        match result {
            Err(sqlx::Error::Database(e))
                if attempt < 3 && e.is_unique_violation() =>
            {
                log::warn!("Access code collision, retrying ({attempt})");
            }
            other => return other,
        }
    }
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Presentation>, sqlx::Error> {
    sqlx::query_as::<_, Presentation>(&format!("SELECT {COLUMNS} FROM presentations WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_access_code(pool: &PgPool, code: &str) -> Result<Option<Presentation>, sqlx::Error> {
    sqlx::query_as::<_, Presentation>(&format!(
        "SELECT {COLUMNS} FROM presentations WHERE access_code = $1"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_creator(pool: &PgPool, creator_id: i64) -> Result<Vec<Presentation>, sqlx::Error> {
    sqlx::query_as::<_, Presentation>(&format!(
        "SELECT {COLUMNS} FROM presentations WHERE creator_id = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<Presentation>, sqlx::Error> {
    sqlx::query_as::<_, Presentation>(&format!(
        "SELECT {COLUMNS} FROM presentations ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await
}

/// True when an edit touches a field the briefing is generated from.
const CHANGED: &str = "(title IS DISTINCT FROM $2 OR context IS DISTINCT FROM $4 OR content IS DISTINCT FROM $5)";

/// Update the editable fields. Returns false if the presentation does not exist.
///
/// A change to title, context or content drops the cached briefing and supersedes
/// any claim in flight, so a generation started from the old text cannot store it.
pub async fn update(pool: &PgPool, id: i64, edit: &PresentationEdit) -> Result<bool, sqlx::Error> {
    // SET expressions see the old row, so the comparison is against the previous values
    let sql = format!(
        "UPDATE presentations SET \
            cached_ai_content = CASE WHEN {CHANGED} THEN NULL ELSE cached_ai_content END, \
            claim_epoch = CASE WHEN {CHANGED} THEN claim_epoch + 1 ELSE claim_epoch END, \
            claimed_until = CASE WHEN {CHANGED} THEN NULL ELSE claimed_until END, \
            title = $2, description = $3, context = $4, content = $5 \
         WHERE id = $1"
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(&edit.title)
        .bind(&edit.description)
        .bind(&edit.context)
        .bind(&edit.content)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a presentation; its feedback goes with it (ON DELETE CASCADE).
pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM presentations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- Schedule state ---------------------------------------------------------

/// Presentations armed with a due time strictly before `now`.
pub async fn find_due(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Presentation>, sqlx::Error> {
    sqlx::query_as::<_, Presentation>(&format!(
        "SELECT {COLUMNS} FROM presentations \
         WHERE processing_scheduled AND next_processing_time < $1 \
         ORDER BY next_processing_time, id"
    ))
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Arm (or re-arm) regeneration. Any earlier due time is overwritten.
pub async fn arm(pool: &PgPool, id: i64, due_at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE presentations \
         SET processing_scheduled = TRUE, next_processing_time = $2, failed_attempts = 0 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(due_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn claim(
    pool: &PgPool,
    id: i64,
    kind: ClaimKind,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
) -> Result<Option<Claim>, sqlx::Error> {
    let guard = match kind {
        ClaimKind::Scheduled => "processing_scheduled AND next_processing_time < $2",
        ClaimKind::OnDemand => "cached_ai_content IS NULL",
    };
    let sql = format!(
        "UPDATE presentations SET claim_epoch = claim_epoch + 1, claimed_until = $3 \
         WHERE id = $1 AND (claimed_until IS NULL OR claimed_until <= $2) AND {guard} \
         RETURNING claim_epoch, next_processing_time"
    );

    let row: Option<(i64, Option<DateTime<Utc>>)> = sqlx::query_as(&sql)
        .bind(id)
        .bind(now)
        .bind(lease_until)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(epoch, armed_due)| Claim {
        presentation_id: id,
        epoch,
        kind,
        armed_due,
    }))
}

/// Store a freshly generated briefing under `claim`.
///
/// For scheduled claims, the listed feedback is marked processed with `text` as its
/// response, and the schedule is cleared unless it was re-armed after the claim.
/// Returns false when the claim was superseded; nothing is written then.
pub async fn complete(
    pool: &PgPool,
    claim: &Claim,
    text: &str,
    processed_feedback: &[i64],
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let scheduled = claim.kind == ClaimKind::Scheduled;
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE presentations SET \
            cached_ai_content = $3, \
            last_updated = $4, \
            claimed_until = NULL, \
            last_error_message = NULL, \
            last_error_time = NULL, \
            failed_attempts = CASE WHEN $5::boolean THEN 0 ELSE failed_attempts END, \
            processing_scheduled = CASE \
                WHEN $5::boolean AND next_processing_time IS NOT DISTINCT FROM $6::timestamptz THEN FALSE \
                ELSE processing_scheduled END, \
            next_processing_time = CASE \
                WHEN $5::boolean AND next_processing_time IS NOT DISTINCT FROM $6::timestamptz THEN NULL \
                ELSE next_processing_time END \
         WHERE id = $1 AND claim_epoch = $2",
    )
    .bind(claim.presentation_id)
    .bind(claim.epoch)
    .bind(text)
    .bind(now)
    .bind(scheduled)
    .bind(claim.armed_due)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    if scheduled {
        feedback::mark_processed(&mut *tx, processed_feedback, text).await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Record a failed generation under `claim`.
///
/// `error` is kept as the last error until the next successful generation.
/// An existing briefing is kept; `fallback` is only stored when nothing was cached.
/// For scheduled claims the schedule is cleared, or re-armed at `retry_at` when given,
/// unless new feedback re-armed it in the meantime.
pub async fn fail(
    pool: &PgPool,
    claim: &Claim,
    error: &str,
    fallback: Option<&str>,
    retry_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let scheduled = claim.kind == ClaimKind::Scheduled;
    let result = sqlx::query(
        "UPDATE presentations SET \
            last_error_message = $8, \
            last_error_time = $4, \
            last_updated = CASE WHEN cached_ai_content IS NULL AND $3::text IS NOT NULL \
                THEN $4 ELSE last_updated END, \
            cached_ai_content = COALESCE(cached_ai_content, $3::text), \
            claimed_until = NULL, \
            failed_attempts = CASE \
                WHEN NOT $5::boolean THEN failed_attempts \
                WHEN $6::timestamptz IS NOT NULL THEN failed_attempts + 1 \
                ELSE 0 END, \
            processing_scheduled = CASE \
                WHEN NOT $5::boolean THEN processing_scheduled \
                WHEN next_processing_time IS DISTINCT FROM $7::timestamptz THEN processing_scheduled \
                ELSE $6::timestamptz IS NOT NULL END, \
            next_processing_time = CASE \
                WHEN NOT $5::boolean THEN next_processing_time \
                WHEN next_processing_time IS DISTINCT FROM $7::timestamptz THEN next_processing_time \
                ELSE $6::timestamptz END \
         WHERE id = $1 AND claim_epoch = $2",
    )
    .bind(claim.presentation_id)
    .bind(claim.epoch)
    .bind(fallback)
    .bind(now)
    .bind(scheduled)
    .bind(retry_at)
    .bind(claim.armed_due)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Drop the lease without touching the cache or the schedule.
pub async fn release(pool: &PgPool, claim: &Claim) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE presentations SET claimed_until = NULL WHERE id = $1 AND claim_epoch = $2")
        .bind(claim.presentation_id)
        .bind(claim.epoch)
        .execute(pool)
        .await?;
    Ok(())
}
