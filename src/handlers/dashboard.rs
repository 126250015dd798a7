use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::session::current_user;
use crate::errors::{AppError, render};
use crate::models::presentation;
use crate::templates_structs::{DashboardTemplate, PageContext, PresentationRow};

/// Presenter dashboard: own presentations, or every presentation for admins.
pub async fn index(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;

    let presentations = if user.is_admin {
        presentation::find_all(&pool).await?
    } else {
        presentation::find_by_creator(&pool, user.id).await?
    };

    let tmpl = DashboardTemplate {
        ctx: PageContext::for_user(&session, &user),
        presentations: presentations.iter().map(PresentationRow::from).collect(),
    };
    render(tmpl)
}
