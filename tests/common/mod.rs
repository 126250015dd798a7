//! Shared test infrastructure.
//!
//! - `MemoryStore` - in-memory `BriefingStore` with the same claim/complete/fail
//!   semantics as the Postgres queries, so engine tests need no database; can
//!   simulate failing feedback reads
//! - `ScriptedGenerator` - counting `ContentGenerator` with optional delay and failure
//! - `test_pool()` - Postgres pool from `TEST_DATABASE_URL`, or `None` to skip

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::distr::{Alphanumeric, SampleString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use talkback::briefing::generator::{ContentGenerator, GenerationError, GenerationRequest};
use talkback::briefing::store::{BriefingStore, Claim, ClaimKind, Feedback, Presentation};
use talkback::briefing::{Briefing, BriefingSettings};

// ============================================================================
// TIME HELPERS
// ============================================================================

/// Fixed reference instant for scheduler scenarios.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn secs(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

/// Defaults with a short resolve poll so waiting readers do not slow the suite.
pub fn test_settings() -> BriefingSettings {
    BriefingSettings {
        resolve_poll: Duration::from_millis(10),
        ..BriefingSettings::default()
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
struct State {
    presentations: BTreeMap<i64, Presentation>,
    feedback: Vec<Feedback>,
    next_presentation_id: i64,
    next_feedback_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    feedback_reads_fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Insert a presentation with no cached briefing and no schedule.
    pub fn insert(&self, title: &str, context: &str, content: &str) -> Presentation {
        let mut state = self.lock();
        state.next_presentation_id += 1;
        let id = state.next_presentation_id;
        let p = Presentation {
            id,
            title: title.to_string(),
            description: String::new(),
            context: context.to_string(),
            content: content.to_string(),
            access_code: format!("code{id:04}"),
            creator_id: 1,
            created_at: t0(),
            cached_ai_content: None,
            last_updated: None,
            processing_scheduled: false,
            next_processing_time: None,
            claim_epoch: 0,
            claimed_until: None,
            failed_attempts: 0,
            last_error_message: None,
            last_error_time: None,
        };
        state.presentations.insert(id, p.clone());
        p
    }

    pub fn get(&self, id: i64) -> Presentation {
        self.lock().presentations[&id].clone()
    }

    pub fn set_cached(&self, id: i64, text: &str) {
        let mut state = self.lock();
        let p = state.presentations.get_mut(&id).unwrap();
        p.cached_ai_content = Some(text.to_string());
        p.last_updated = Some(t0());
    }

    /// Change the content the way a presenter's edit does: the cached briefing is
    /// dropped and any claim in flight is superseded.
    pub fn edit_content(&self, id: i64, content: &str) {
        let mut state = self.lock();
        let p = state.presentations.get_mut(&id).unwrap();
        p.content = content.to_string();
        p.cached_ai_content = None;
        p.claim_epoch += 1;
        p.claimed_until = None;
    }

    /// Feedback for `id`, newest first.
    pub fn feedback(&self, id: i64) -> Vec<Feedback> {
        let state = self.lock();
        let mut items: Vec<Feedback> = state
            .feedback
            .iter()
            .filter(|f| f.presentation_id == id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }

    /// Make `feedback_for` return a pool timeout until switched off again.
    pub fn set_feedback_reads_fail(&self, fail: bool) {
        self.feedback_reads_fail.store(fail, Ordering::SeqCst);
    }

    pub fn unprocessed_count(&self, id: i64) -> usize {
        self.feedback(id).iter().filter(|f| !f.is_processed).count()
    }
}

#[async_trait]
impl BriefingStore for MemoryStore {
    async fn find_presentation(&self, id: i64) -> Result<Option<Presentation>, sqlx::Error> {
        Ok(self.lock().presentations.get(&id).cloned())
    }

    async fn find_by_access_code(&self, code: &str) -> Result<Option<Presentation>, sqlx::Error> {
        Ok(self
            .lock()
            .presentations
            .values()
            .find(|p| p.access_code == code)
            .cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Presentation>, sqlx::Error> {
        let mut due: Vec<Presentation> = self
            .lock()
            .presentations
            .values()
            .filter(|p| p.is_due_at(now))
            .cloned()
            .collect();
        due.sort_by_key(|p| (p.next_processing_time, p.id));
        Ok(due)
    }

    async fn add_feedback(
        &self,
        presentation_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Feedback, sqlx::Error> {
        let mut state = self.lock();
        if !state.presentations.contains_key(&presentation_id) {
            return Err(sqlx::Error::RowNotFound);
        }
        state.next_feedback_id += 1;
        let item = Feedback {
            id: state.next_feedback_id,
            presentation_id,
            content: content.to_string(),
            created_at: now,
            is_processed: false,
            ai_response: None,
        };
        state.feedback.push(item.clone());
        Ok(item)
    }

    async fn arm(&self, presentation_id: i64, due_at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let mut state = self.lock();
        let Some(p) = state.presentations.get_mut(&presentation_id) else {
            return Ok(false);
        };
        p.processing_scheduled = true;
        p.next_processing_time = Some(due_at);
        p.failed_attempts = 0;
        Ok(true)
    }

    async fn feedback_for(&self, presentation_id: i64) -> Result<Vec<Feedback>, sqlx::Error> {
        if self.feedback_reads_fail.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.feedback(presentation_id))
    }

    async fn claim(
        &self,
        presentation_id: i64,
        kind: ClaimKind,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<Claim>, sqlx::Error> {
        let mut state = self.lock();
        let Some(p) = state.presentations.get_mut(&presentation_id) else {
            return Ok(None);
        };
        let eligible = match kind {
            ClaimKind::Scheduled => p.is_due_at(now),
            ClaimKind::OnDemand => p.cached_ai_content.is_none(),
        };
        if !eligible || p.is_claimed_at(now) {
            return Ok(None);
        }
        p.claim_epoch += 1;
        p.claimed_until = Some(lease_until);
        Ok(Some(Claim {
            presentation_id,
            epoch: p.claim_epoch,
            kind,
            armed_due: p.next_processing_time,
        }))
    }

    async fn complete(
        &self,
        claim: &Claim,
        text: &str,
        processed_feedback: &[i64],
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let scheduled = claim.kind == ClaimKind::Scheduled;
        let Some(p) = state.presentations.get_mut(&claim.presentation_id) else {
            return Ok(false);
        };
        if p.claim_epoch != claim.epoch {
            return Ok(false);
        }
        p.cached_ai_content = Some(text.to_string());
        p.last_updated = Some(now);
        p.claimed_until = None;
        p.last_error_message = None;
        p.last_error_time = None;
        if scheduled {
            p.failed_attempts = 0;
            if p.next_processing_time == claim.armed_due {
                p.processing_scheduled = false;
                p.next_processing_time = None;
            }
            for f in state.feedback.iter_mut() {
                if processed_feedback.contains(&f.id) && !f.is_processed {
                    f.is_processed = true;
                    f.ai_response = Some(text.to_string());
                }
            }
        }
        Ok(true)
    }

    async fn fail(
        &self,
        claim: &Claim,
        error: &str,
        fallback: Option<&str>,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let mut state = self.lock();
        let Some(p) = state.presentations.get_mut(&claim.presentation_id) else {
            return Ok(false);
        };
        if p.claim_epoch != claim.epoch {
            return Ok(false);
        }
        p.last_error_message = Some(error.to_string());
        p.last_error_time = Some(now);
        if p.cached_ai_content.is_none() {
            if let Some(text) = fallback {
                p.cached_ai_content = Some(text.to_string());
                p.last_updated = Some(now);
            }
        }
        p.claimed_until = None;
        if claim.kind == ClaimKind::Scheduled {
            p.failed_attempts = if retry_at.is_some() { p.failed_attempts + 1 } else { 0 };
            if p.next_processing_time == claim.armed_due {
                p.processing_scheduled = retry_at.is_some();
                p.next_processing_time = retry_at;
            }
        }
        Ok(true)
    }

    async fn release(&self, claim: &Claim) -> Result<(), sqlx::Error> {
        let mut state = self.lock();
        if let Some(p) = state.presentations.get_mut(&claim.presentation_id) {
            if p.claim_epoch == claim.epoch {
                p.claimed_until = None;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SCRIPTED GENERATOR
// ============================================================================

/// Returns `"# Briefing {n}"` plus the feedback it saw, or a 500 error while failing.
#[derive(Default)]
pub struct ScriptedGenerator {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Duration,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        let generator = Self::default();
        generator.set_failing(true);
        generator
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> GenerationRequest {
        self.requests().pop().expect("generator was never called")
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::Status {
                status: 500,
                body: "upstream unavailable".to_string(),
            });
        }
        let mut text = format!("# Briefing {n}\n");
        for item in &request.feedback {
            text.push_str(&format!("- {item}\n"));
        }
        Ok(text)
    }
}

// ============================================================================
// ENGINE SETUP
// ============================================================================

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub briefing: Arc<Briefing>,
}

pub fn harness_with(generator: ScriptedGenerator, settings: BriefingSettings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(generator);
    let briefing = Arc::new(Briefing::new(store.clone(), generator.clone(), settings));
    Harness { store, generator, briefing }
}

pub fn harness() -> Harness {
    harness_with(ScriptedGenerator::new(), test_settings())
}

// ============================================================================
// POSTGRES
// ============================================================================

/// Migrated pool on `TEST_DATABASE_URL`; `None` when the variable is unset.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("Failed to connect to TEST_DATABASE_URL");
    talkback::db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

/// Username that does not collide with other tests sharing the database.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}_{}", Alphanumeric.sample_string(&mut rand::rng(), 10))
}
