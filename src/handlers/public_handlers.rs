//! Reader-facing routes. No session is required for any of these.

use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::session;
use crate::briefing::store::Presentation;
use crate::briefing::{Briefing, BriefingError};
use crate::errors::{AppError, render};
use crate::models::feedback::FeedbackSubmission;
use crate::templates_structs::{APP_NAME, IndexTemplate, PublicViewTemplate, display_time};

#[derive(Deserialize)]
pub struct IndexQuery {
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct JoinQuery {
    #[serde(default)]
    pub code: String,
}

#[derive(Serialize)]
struct PublicContent {
    access_code: String,
    title: String,
    description: String,
    content: String,
}

#[derive(Serialize)]
struct ProcessingStatus {
    scheduled: bool,
    next_update: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct PublicRead {
    presentation: PublicContent,
    ai_content: String,
    processing: ProcessingStatus,
    refresh_interval: u64,
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location.to_string()))
        .finish()
}

fn json_error(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "success": false,
        "error": message,
    }))
}

pub async fn index(session: Session, query: web::Query<IndexQuery>) -> Result<HttpResponse, AppError> {
    let error = match query.error.as_deref() {
        Some("not_found") => Some("No presentation matches that access code.".to_string()),
        Some(_) => Some("Please enter an access code.".to_string()),
        None => None,
    };
    render(IndexTemplate {
        app_name: APP_NAME.to_string(),
        logged_in: session::get_user_id(&session).is_some(),
        error,
    })
}

pub async fn join(query: web::Query<JoinQuery>) -> HttpResponse {
    let code = query.code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return redirect("/?error=missing");
    }
    redirect(&format!("/p/{}", code.to_ascii_lowercase()))
}

/// Looks up the presentation behind `code` and resolves its briefing, then re-reads
/// the row so the status reflects whatever the resolution stored.
async fn load_public(briefing: &Briefing, code: &str) -> Result<(Presentation, String), BriefingError> {
    let found = briefing
        .store()
        .find_by_access_code(code)
        .await?
        .ok_or(BriefingError::NotFound)?;
    let text = briefing.resolve(found.id).await?;
    let current = briefing
        .store()
        .find_presentation(found.id)
        .await?
        .ok_or(BriefingError::NotFound)?;
    Ok((current, text))
}

pub async fn view(
    briefing: web::Data<Briefing>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let code = path.into_inner();
    let (presentation, text) = match load_public(&briefing, &code).await {
        Ok(found) => found,
        Err(BriefingError::NotFound) => return Ok(redirect("/?error=not_found")),
        Err(e) => return Err(e.into()),
    };

    render(PublicViewTemplate {
        app_name: APP_NAME.to_string(),
        access_code: presentation.access_code.clone(),
        title: presentation.title.clone(),
        description: presentation.description.clone(),
        briefing: text,
        scheduled: presentation.processing_scheduled,
        next_update: presentation
            .next_processing_time
            .as_ref()
            .map(display_time)
            .unwrap_or_default(),
        refresh_secs: briefing.settings().client_refresh.as_secs(),
    })
}

pub async fn read(briefing: web::Data<Briefing>, path: web::Path<String>) -> HttpResponse {
    let code = path.into_inner();
    match load_public(&briefing, &code).await {
        Ok((presentation, text)) => HttpResponse::Ok().json(PublicRead {
            processing: ProcessingStatus {
                scheduled: presentation.processing_scheduled,
                next_update: presentation.next_processing_time,
            },
            presentation: PublicContent {
                access_code: presentation.access_code,
                title: presentation.title,
                description: presentation.description,
                content: presentation.content,
            },
            ai_content: text,
            refresh_interval: briefing.settings().client_refresh.as_secs(),
        }),
        Err(BriefingError::NotFound) => {
            json_error(actix_web::http::StatusCode::NOT_FOUND, "Presentation not found")
        }
        Err(e) => {
            log::error!("Public read for '{code}' failed: {e}");
            json_error(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

pub async fn submit_feedback(
    briefing: web::Data<Briefing>,
    path: web::Path<String>,
    body: web::Json<FeedbackSubmission>,
) -> HttpResponse {
    let code = path.into_inner();
    match briefing.submit_feedback(&code, &body.feedback).await {
        Ok(receipt) => HttpResponse::Ok().json(receipt),
        Err(BriefingError::Store(e)) => {
            log::error!("Storing feedback for '{code}' failed: {e}");
            json_error(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        Err(e) => json_error(actix_web::http::StatusCode::BAD_REQUEST, &e.to_string()),
    }
}
