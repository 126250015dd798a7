use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A presentation row including the cached briefing and its schedule state.
///
/// `processing_scheduled` is true exactly when `next_processing_time` is set;
/// the table enforces this with a CHECK constraint.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Presentation {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub context: String,
    pub content: String,
    pub access_code: String,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub cached_ai_content: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub processing_scheduled: bool,
    pub next_processing_time: Option<DateTime<Utc>>,
    pub claim_epoch: i64,
    pub claimed_until: Option<DateTime<Utc>>,
    pub failed_attempts: i32,
    /// Most recent generation failure; cleared by the next successful generation.
    pub last_error_message: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

impl Presentation {
    /// Armed and past its due time (strictly).
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.processing_scheduled && self.next_processing_time.is_some_and(|due| due < now)
    }

    /// A worker holds an unexpired lease on this presentation.
    pub fn is_claimed_at(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }

    pub fn share_path(&self) -> String {
        format!("/p/{}", self.access_code)
    }
}

/// New presentation data for creation.
pub struct NewPresentation {
    pub title: String,
    pub description: String,
    pub context: String,
    pub content: String,
    pub creator_id: i64,
}

/// Editable fields. Changing title, context or content invalidates the cached briefing.
#[derive(Debug, Clone)]
pub struct PresentationEdit {
    pub title: String,
    pub description: String,
    pub context: String,
    pub content: String,
}

/// Form data from the create/edit presentation forms.
#[derive(Debug, Deserialize)]
pub struct PresentationForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context: String,
    pub content: String,
    pub csrf_token: String,
}

impl PresentationForm {
    pub fn to_edit(&self) -> PresentationEdit {
        PresentationEdit {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            context: self.context.trim().to_string(),
            content: self.content.trim().to_string(),
        }
    }
}

/// Which path is taking the presentation for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// Scheduler tick: only succeeds while the presentation is armed and due.
    Scheduled,
    /// Reader request: only succeeds while no briefing is cached yet.
    OnDemand,
}

/// Lease on a presentation, taken before calling the generator.
///
/// Writes made under a claim only apply while `epoch` still matches the row,
/// so a worker whose lease expired and was superseded cannot clobber newer state.
#[derive(Debug, Clone)]
pub struct Claim {
    pub presentation_id: i64,
    pub epoch: i64,
    pub kind: ClaimKind,
    /// Due time the schedule had when claimed; a different value at completion
    /// means new feedback re-armed the presentation mid-generation.
    pub armed_due: Option<DateTime<Utc>>,
}
