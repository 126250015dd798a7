use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{feedback, presentation};

pub use crate::models::feedback::Feedback;
pub use crate::models::presentation::{Claim, ClaimKind, Presentation};

/// Persistence seam for the briefing engine.
///
/// `complete` and `fail` must only apply while the claim's epoch still matches the
/// stored row, and must keep `processing_scheduled` and `next_processing_time` in step.
/// `fail` records the last error; `complete` clears it.
#[async_trait]
pub trait BriefingStore: Send + Sync {
    async fn find_presentation(&self, id: i64) -> Result<Option<Presentation>, sqlx::Error>;

    async fn find_by_access_code(&self, code: &str) -> Result<Option<Presentation>, sqlx::Error>;

    /// Presentations armed with a due time strictly before `now`.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Presentation>, sqlx::Error>;

    async fn add_feedback(
        &self,
        presentation_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Feedback, sqlx::Error>;

    /// Arm regeneration at `due_at`, overwriting any earlier due time.
    async fn arm(&self, presentation_id: i64, due_at: DateTime<Utc>) -> Result<bool, sqlx::Error>;

    /// Entire feedback history, newest first.
    async fn feedback_for(&self, presentation_id: i64) -> Result<Vec<Feedback>, sqlx::Error>;

    async fn claim(
        &self,
        presentation_id: i64,
        kind: ClaimKind,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<Claim>, sqlx::Error>;

    async fn complete(
        &self,
        claim: &Claim,
        text: &str,
        processed_feedback: &[i64],
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>;

    async fn fail(
        &self,
        claim: &Claim,
        error: &str,
        fallback: Option<&str>,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>;

    async fn release(&self, claim: &Claim) -> Result<(), sqlx::Error>;
}

/// Postgres-backed store over the `presentations` and `feedback` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BriefingStore for PgStore {
    async fn find_presentation(&self, id: i64) -> Result<Option<Presentation>, sqlx::Error> {
        presentation::find_by_id(&self.pool, id).await
    }

    async fn find_by_access_code(&self, code: &str) -> Result<Option<Presentation>, sqlx::Error> {
        presentation::find_by_access_code(&self.pool, code).await
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Presentation>, sqlx::Error> {
        presentation::find_due(&self.pool, now).await
    }

    async fn add_feedback(
        &self,
        presentation_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Feedback, sqlx::Error> {
        feedback::create(&self.pool, presentation_id, content, now).await
    }

    async fn arm(&self, presentation_id: i64, due_at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        presentation::arm(&self.pool, presentation_id, due_at).await
    }

    async fn feedback_for(&self, presentation_id: i64) -> Result<Vec<Feedback>, sqlx::Error> {
        feedback::find_by_presentation(&self.pool, presentation_id).await
    }

    async fn claim(
        &self,
        presentation_id: i64,
        kind: ClaimKind,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<Claim>, sqlx::Error> {
        presentation::claim(&self.pool, presentation_id, kind, now, lease_until).await
    }

    async fn complete(
        &self,
        claim: &Claim,
        text: &str,
        processed_feedback: &[i64],
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        presentation::complete(&self.pool, claim, text, processed_feedback, now).await
    }

    async fn fail(
        &self,
        claim: &Claim,
        error: &str,
        fallback: Option<&str>,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        presentation::fail(&self.pool, claim, error, fallback, retry_at, now).await
    }

    async fn release(&self, claim: &Claim) -> Result<(), sqlx::Error> {
        presentation::release(&self.pool, claim).await
    }
}
