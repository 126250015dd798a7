use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One anonymous feedback item on a presentation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: i64,
    pub presentation_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_processed: bool,
    /// Briefing generated when this item's batch was processed.
    pub ai_response: Option<String>,
}

/// JSON body of a public feedback submission.
#[derive(Debug, Deserialize)]
pub struct FeedbackSubmission {
    pub feedback: String,
}
