use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use super::helpers;
use crate::auth::csrf;
use crate::auth::session::current_user;
use crate::config::AppConfig;
use crate::errors::{AppError, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::models::{feedback, presentation};
use crate::models::presentation::{NewPresentation, PresentationForm};
use crate::templates_structs::{
    FeedbackRow, PageContext, PresentationDetailTemplate, PresentationFormTemplate, PresentationRow,
};

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location.to_string()))
        .finish()
}

pub async fn new_form(session: Session) -> Result<HttpResponse, AppError> {
    let tmpl = PresentationFormTemplate {
        ctx: PageContext::build(&session)?,
        form_action: "/presentations".to_string(),
        form_title: "New Presentation".to_string(),
        title: String::new(),
        description: String::new(),
        context: String::new(),
        content: String::new(),
        errors: vec![],
    };
    render(tmpl)
}

pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<PresentationForm>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let errors = helpers::validate_presentation_form(&form);
    if !errors.is_empty() {
        let tmpl = PresentationFormTemplate {
            ctx: PageContext::for_user(&session, &user),
            form_action: "/presentations".to_string(),
            form_title: "New Presentation".to_string(),
            title: form.title.clone(),
            description: form.description.clone(),
            context: form.context.clone(),
            content: form.content.clone(),
            errors,
        };
        return render(tmpl);
    }

    let edit = form.to_edit();
    let new = NewPresentation {
        title: edit.title,
        description: edit.description,
        context: edit.context,
        content: edit.content,
        creator_id: user.id,
    };
    let created = presentation::create(&pool, &new).await?;
    log::info!(
        "User {} created presentation {} ({})",
        user.id,
        created.id,
        created.access_code
    );

    let _ = session.insert("flash", "Presentation created");
    Ok(see_other("/dashboard"))
}

pub async fn detail(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;
    let found = helpers::load_managed(&pool, &user, path.into_inner()).await?;

    let items = feedback::find_by_presentation(&pool, found.id).await?;
    let pending_count = items.iter().filter(|f| !f.is_processed).count();

    let tmpl = PresentationDetailTemplate {
        ctx: PageContext::for_user(&session, &user),
        share_url: format!("{}{}", config.public_base_url, found.share_path()),
        presentation: PresentationRow::from(&found),
        briefing: found.cached_ai_content.clone(),
        feedback: items.iter().map(FeedbackRow::from).collect(),
        pending_count,
    };
    render(tmpl)
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;
    let found = helpers::load_managed(&pool, &user, path.into_inner()).await?;

    let tmpl = PresentationFormTemplate {
        ctx: PageContext::for_user(&session, &user),
        form_action: format!("/presentations/{}/edit", found.id),
        form_title: "Edit Presentation".to_string(),
        title: found.title,
        description: found.description,
        context: found.context,
        content: found.content,
        errors: vec![],
    };
    render(tmpl)
}

pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<PresentationForm>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let found = helpers::load_managed(&pool, &user, path.into_inner()).await?;

    let errors = helpers::validate_presentation_form(&form);
    if !errors.is_empty() {
        let tmpl = PresentationFormTemplate {
            ctx: PageContext::for_user(&session, &user),
            form_action: format!("/presentations/{}/edit", found.id),
            form_title: "Edit Presentation".to_string(),
            title: form.title.clone(),
            description: form.description.clone(),
            context: form.context.clone(),
            content: form.content.clone(),
            errors,
        };
        return render(tmpl);
    }

    if !presentation::update(&pool, found.id, &form.to_edit()).await? {
        return Err(AppError::NotFound);
    }
    log::info!("User {} updated presentation {}", user.id, found.id);

    let _ = session.insert("flash", "Presentation updated");
    Ok(see_other(&format!("/presentations/{}", found.id)))
}

pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&session)?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let found = helpers::load_managed(&pool, &user, path.into_inner()).await?;

    presentation::delete(&pool, found.id).await?;
    log::info!("User {} deleted presentation {}", user.id, found.id);

    let _ = session.insert("flash", "Presentation deleted");
    Ok(see_other("/dashboard"))
}
