//! Feedback-driven briefing engine.
//!
//! Readers submit feedback against a presentation's access code; each submission
//! pushes the presentation's due time forward by the debounce interval. A periodic
//! tick (see [`scheduler`]) regenerates every presentation whose quiet period has
//! elapsed. Readers always get the cached briefing when one exists, and trigger a
//! one-off synchronous generation when none does.
//!
//! Every generation runs under a [`store::Claim`] so the scheduled and on-demand
//! paths never call the generator twice for the same presentation at once.

pub mod generator;
pub mod scheduler;
pub mod store;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use self::generator::{ContentGenerator, GenerationRequest, error_markdown};
use self::store::{BriefingStore, Claim, ClaimKind, Feedback, Presentation};

pub const MAX_FEEDBACK_LEN: usize = 1000;

/// Served while another worker holds the claim on a never-generated briefing.
pub const PENDING_MARKDOWN: &str =
    "## Preparing\nThe briefing is being generated. This page refreshes automatically.";

pub const RECEIVED_MESSAGE: &str =
    "Your feedback was received and is being processed. The page will update shortly.";

#[derive(Debug, Clone)]
pub struct BriefingSettings {
    /// Quiet period after the last submission before regeneration.
    pub debounce: Duration,
    /// How often reader pages poll for a fresh briefing.
    pub client_refresh: Duration,
    /// How long a claim shields a presentation from other workers.
    pub claim_lease: Duration,
    /// Poll step while waiting for another worker's on-demand generation.
    pub resolve_poll: Duration,
    /// Scheduled retries after a failed generation (0 disables retrying).
    pub retry_limit: u32,
    pub retry_delay: Duration,
}

impl Default for BriefingSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(30),
            client_refresh: Duration::from_secs(20),
            claim_lease: Duration::from_secs(300),
            resolve_poll: Duration::from_millis(500),
            retry_limit: 0,
            retry_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub enum BriefingError {
    NotFound,
    Invalid(String),
    Store(sqlx::Error),
}

impl fmt::Display for BriefingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BriefingError::NotFound => write!(f, "Presentation not found"),
            BriefingError::Invalid(msg) => write!(f, "{msg}"),
            BriefingError::Store(e) => write!(f, "Database error: {e}"),
        }
    }
}

impl std::error::Error for BriefingError {}

impl From<sqlx::Error> for BriefingError {
    fn from(e: sqlx::Error) -> Self {
        BriefingError::Store(e)
    }
}

/// Acknowledgement returned to a reader right after submitting feedback.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReceipt {
    pub success: bool,
    pub ai_response: String,
    pub processing: bool,
    pub next_update: DateTime<Utc>,
}

pub struct Briefing {
    store: Arc<dyn BriefingStore>,
    generator: Arc<dyn ContentGenerator>,
    settings: BriefingSettings,
}

impl Briefing {
    pub fn new(
        store: Arc<dyn BriefingStore>,
        generator: Arc<dyn ContentGenerator>,
        settings: BriefingSettings,
    ) -> Self {
        Self { store, generator, settings }
    }

    pub fn settings(&self) -> &BriefingSettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn BriefingStore {
        self.store.as_ref()
    }

    pub async fn submit_feedback(&self, access_code: &str, text: &str) -> Result<FeedbackReceipt, BriefingError> {
        self.submit_feedback_at(access_code, text, Utc::now()).await
    }

    /// Store the feedback and (re-)arm regeneration at `now + debounce`.
    ///
    /// The due time is overwritten on every submission, so a steady stream of
    /// feedback keeps postponing the batch until a quiet period occurs.
    pub async fn submit_feedback_at(
        &self,
        access_code: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<FeedbackReceipt, BriefingError> {
        let text = validate_feedback(text)?;
        let presentation = self
            .store
            .find_by_access_code(access_code)
            .await?
            .ok_or(BriefingError::NotFound)?;

        let item = self.store.add_feedback(presentation.id, text, now).await?;
        let due = now + to_chrono(self.settings.debounce);
        self.store.arm(presentation.id, due).await?;

        log::info!(
            "Feedback {} on presentation {}, regeneration due at {}",
            item.id,
            presentation.id,
            due.to_rfc3339()
        );

        Ok(FeedbackReceipt {
            success: true,
            ai_response: RECEIVED_MESSAGE.to_string(),
            processing: true,
            next_update: due,
        })
    }

    /// Cached briefing, or a synchronously generated one if nothing is cached yet.
    ///
    /// Does not look at the schedule: a pending regeneration still serves the stale text.
    pub async fn resolve(&self, presentation_id: i64) -> Result<String, BriefingError> {
        let deadline = tokio::time::Instant::now() + self.settings.claim_lease;

        loop {
            let presentation = self
                .store
                .find_presentation(presentation_id)
                .await?
                .ok_or(BriefingError::NotFound)?;

            if let Some(text) = presentation.cached_ai_content {
                return Ok(text);
            }

            let now = Utc::now();
            let lease_until = now + to_chrono(self.settings.claim_lease);
            if let Some(claim) = self
                .store
                .claim(presentation_id, ClaimKind::OnDemand, now, lease_until)
                .await?
            {
                if let Some(text) = self.generate_on_demand(presentation_id, &claim).await? {
                    return Ok(text);
                }
                // Superseded by an edit while generating; start over from the new row
                continue;
            }

            if tokio::time::Instant::now() >= deadline {
                log::warn!("Gave up waiting for briefing of presentation {presentation_id}");
                return Ok(PENDING_MARKDOWN.to_string());
            }
            tokio::time::sleep(self.settings.resolve_poll).await;
        }
    }

    /// Generate under `claim` from the row as it stands after claiming.
    ///
    /// `None` when the claim was superseded before the result could be stored.
    async fn generate_on_demand(&self, presentation_id: i64, claim: &Claim) -> Result<Option<String>, BriefingError> {
        let presentation = match self.store.find_presentation(presentation_id).await {
            Ok(Some(p)) => p,
            Ok(None) => return Err(BriefingError::NotFound),
            Err(e) => {
                self.release_quietly(claim).await;
                return Err(e.into());
            }
        };
        let feedback = match self.store.feedback_for(presentation_id).await {
            Ok(f) => f,
            Err(e) => {
                self.release_quietly(claim).await;
                return Err(e.into());
            }
        };

        match self.generator.generate(&request_for(&presentation, &feedback)).await {
            Ok(text) => {
                if !self.store.complete(claim, &text, &[], Utc::now()).await? {
                    log::info!("Briefing for presentation {presentation_id} changed while generating");
                    return Ok(None);
                }
                log::info!("Generated initial briefing for presentation {presentation_id}");
                Ok(Some(text))
            }
            Err(e) => {
                log::error!("Briefing generation failed for presentation {presentation_id}: {e}");
                let fallback = error_markdown(&e);
                if !self.store.fail(claim, &e.to_string(), Some(&fallback), None, Utc::now()).await? {
                    return Ok(None);
                }
                Ok(Some(fallback))
            }
        }
    }

    async fn release_quietly(&self, claim: &Claim) {
        if let Err(e) = self.store.release(claim).await {
            log::error!(
                "Could not release claim on presentation {}: {e}",
                claim.presentation_id
            );
        }
    }

    /// One-shot briefing for unsaved context and content; nothing is cached or scheduled.
    pub async fn preview(&self, context: &str, content: &str) -> Result<String, BriefingError> {
        if context.trim().is_empty() || content.trim().is_empty() {
            return Err(BriefingError::Invalid("Context and content are required".to_string()));
        }

        let request = GenerationRequest {
            context: context.to_string(),
            content: content.to_string(),
            feedback: vec![],
        };
        match self.generator.generate(&request).await {
            Ok(text) => Ok(text),
            Err(e) => {
                log::error!("Preview generation failed: {e}");
                Ok(error_markdown(&e))
            }
        }
    }

    /// Run one scheduler pass as of `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<scheduler::TickReport> {
        scheduler::run_tick(self, now).await
    }
}

/// Trimmed feedback text, or `Invalid` when empty or too long.
pub fn validate_feedback(text: &str) -> Result<&str, BriefingError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BriefingError::Invalid("Feedback must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_FEEDBACK_LEN {
        return Err(BriefingError::Invalid(format!(
            "Feedback must be at most {MAX_FEEDBACK_LEN} characters"
        )));
    }
    Ok(trimmed)
}

/// Build the generator request from a presentation and its full feedback history
/// (stored newest first, fed oldest first).
fn request_for(presentation: &Presentation, feedback: &[Feedback]) -> GenerationRequest {
    GenerationRequest {
        context: presentation.context.clone(),
        content: presentation.content.clone(),
        feedback: feedback.iter().rev().map(|f| f.content.clone()).collect(),
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}
