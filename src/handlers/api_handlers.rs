use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::session::current_user;
use crate::briefing::{Briefing, BriefingError};
use crate::errors::AppError;
use crate::handlers::presentation_handlers::helpers::load_managed;
use crate::models::feedback;

#[derive(Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub content: String,
}

/// GET /api/feedbacks/{id}: full feedback history of a managed presentation, newest first.
pub async fn feedbacks(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;
    let found = load_managed(&pool, &user, path.into_inner()).await?;
    let items = feedback::find_by_presentation(&pool, found.id).await?;
    Ok(HttpResponse::Ok().json(items))
}

/// POST /api/generate_preview
pub async fn generate_preview(
    briefing: web::Data<Briefing>,
    session: Session,
    body: web::Json<PreviewRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;
    match briefing.preview(&body.context, &body.content).await {
        Ok(preview) => {
            log::info!("User {} generated a preview", user.id);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "preview": preview,
            })))
        }
        Err(BriefingError::Invalid(msg)) => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": msg,
        }))),
        Err(e) => Err(e.into()),
    }
}
