use actix_session::Session;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::{csrf, password, rate_limit::RateLimiter, session, validate};
use crate::config::AppConfig;
use crate::errors::{AppError, render};
use crate::models::user::{self, NewUser, RegisterForm};
use crate::templates_structs::{APP_NAME, LoginTemplate, RegisterTemplate};

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

fn to_dashboard() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", "/dashboard"))
        .finish()
}

fn login_form(session: &Session, error: Option<&str>) -> Result<HttpResponse, AppError> {
    render(LoginTemplate {
        error: error.map(str::to_string),
        app_name: APP_NAME.to_string(),
        csrf_token: csrf::get_or_create_token(session),
    })
}

pub async fn login_page(session: Session) -> Result<HttpResponse, AppError> {
    if session::get_user_id(&session).is_some() {
        return Ok(to_dashboard());
    }
    login_form(&session, None)
}

pub async fn login_submit(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<LoginForm>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    // Rate-limit check BEFORE any database access
    let ip = req.peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

    if limiter.is_blocked(ip) {
        return login_form(&session, Some("Too many failed login attempts. Please try again later."));
    }

    let found = user::find_by_username(&pool, form.username.trim()).await?;
    match found {
        Some(u) if password::verify_password(&form.password, &u.password) => {
            limiter.clear(ip);
            session::sign_in(&session, &u);
            log::info!("User '{}' logged in", u.username);
            Ok(to_dashboard())
        }
        _ => {
            limiter.record_failure(ip);
            login_form(&session, Some("Invalid username or password"))
        }
    }
}

pub async fn register_page(session: Session) -> Result<HttpResponse, AppError> {
    if session::get_user_id(&session).is_some() {
        return Ok(to_dashboard());
    }
    render(RegisterTemplate {
        errors: vec![],
        username: String::new(),
        app_name: APP_NAME.to_string(),
        csrf_token: csrf::get_or_create_token(&session),
    })
}

pub async fn register_submit(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let username = form.username.trim();
    let mut errors = vec![];
    if !csrf::constant_time_eq(&form.registration_password, &config.registration_password) {
        errors.push("Wrong registration password".to_string());
    }
    errors.extend(validate::validate_username(username));
    errors.extend(validate::validate_password(&form.password));
    if errors.is_empty() && user::find_by_username(&pool, username).await?.is_some() {
        errors.push("Username already taken".to_string());
    }

    if errors.is_empty() {
        let new = NewUser {
            username: username.to_string(),
            password: password::hash_password(&form.password)?,
        };
        match user::create(&pool, &new).await {
            Ok(created) => {
                log::info!("Registered user '{}' (admin: {})", created.username, created.is_admin);
                session::sign_in(&session, &created);
                return Ok(to_dashboard());
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                errors.push("Username already taken".to_string());
            }
            Err(e) => return Err(e.into()),
        }
    }

    render(RegisterTemplate {
        errors,
        username: username.to_string(),
        app_name: APP_NAME.to_string(),
        csrf_token: csrf::get_or_create_token(&session),
    })
}

pub async fn logout(
    session: Session,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/login"))
        .finish())
}
