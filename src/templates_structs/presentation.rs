use askama::Template;

use super::{PageContext, display_time};
use crate::models::feedback::Feedback;
use crate::models::presentation::Presentation;

/// Presentation as listed on the dashboard and shown on its detail page.
pub struct PresentationRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub context: String,
    pub content: String,
    pub access_code: String,
    pub share_path: String,
    pub created_at: String,
    pub has_briefing: bool,
    pub last_updated: String,
    pub scheduled: bool,
    pub next_update: String,
    pub last_error: Option<String>,
    pub last_error_time: String,
}

impl From<&Presentation> for PresentationRow {
    fn from(p: &Presentation) -> Self {
        Self {
            id: p.id,
            title: p.title.clone(),
            description: p.description.clone(),
            context: p.context.clone(),
            content: p.content.clone(),
            access_code: p.access_code.clone(),
            share_path: p.share_path(),
            created_at: display_time(&p.created_at),
            has_briefing: p.cached_ai_content.is_some(),
            last_updated: p.last_updated.as_ref().map(display_time).unwrap_or_default(),
            scheduled: p.processing_scheduled,
            next_update: p.next_processing_time.as_ref().map(display_time).unwrap_or_default(),
            last_error: p.last_error_message.clone(),
            last_error_time: p.last_error_time.as_ref().map(display_time).unwrap_or_default(),
        }
    }
}

pub struct FeedbackRow {
    pub content: String,
    pub created_at: String,
    pub processed: bool,
}

impl From<&Feedback> for FeedbackRow {
    fn from(f: &Feedback) -> Self {
        Self {
            content: f.content.clone(),
            created_at: display_time(&f.created_at),
            processed: f.is_processed,
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub presentations: Vec<PresentationRow>,
}

#[derive(Template)]
#[template(path = "presentations/form.html")]
pub struct PresentationFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub title: String,
    pub description: String,
    pub context: String,
    pub content: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "presentations/detail.html")]
pub struct PresentationDetailTemplate {
    pub ctx: PageContext,
    pub presentation: PresentationRow,
    pub share_url: String,
    pub briefing: Option<String>,
    pub feedback: Vec<FeedbackRow>,
    pub pending_count: usize,
}
