use actix_web::{HttpResponse, middleware::from_fn, web};

use crate::auth::middleware::{require_auth, require_json_content_type};
use crate::handlers::{api_handlers, auth_handlers, dashboard, presentation_handlers, public_handlers};

/// Reader-facing JSON endpoints. They only need `web::Data<Briefing>`.
pub fn public_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/p/{code}", web::get().to(public_handlers::read))
        .service(
            web::resource("/p/{code}/feedback")
                .route(web::post().to(public_handlers::submit_feedback))
                .wrap(from_fn(require_json_content_type)),
        );
}

/// Every route of the application. Static files and the 404 fallback are added by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(public_api)
        .route("/", web::get().to(public_handlers::index))
        .route("/join", web::get().to(public_handlers::join))
        .route("/p/{code}", web::get().to(public_handlers::view))
        .route("/login", web::get().to(auth_handlers::login_page))
        .route("/login", web::post().to(auth_handlers::login_submit))
        .route("/register", web::get().to(auth_handlers::register_page))
        .route("/register", web::post().to(auth_handlers::register_submit))
        // Protected routes; /presentations/new BEFORE /presentations/{id}
        .service(
            web::scope("")
                .wrap(from_fn(require_auth))
                .route("/dashboard", web::get().to(dashboard::index))
                .route("/logout", web::post().to(auth_handlers::logout))
                .route("/presentations/new", web::get().to(presentation_handlers::new_form))
                .route("/presentations", web::post().to(presentation_handlers::create))
                .route("/presentations/{id}", web::get().to(presentation_handlers::detail))
                .route("/presentations/{id}/edit", web::get().to(presentation_handlers::edit_form))
                .route("/presentations/{id}/edit", web::post().to(presentation_handlers::update))
                .route("/presentations/{id}/delete", web::post().to(presentation_handlers::delete))
                .route("/api/feedbacks/{id}", web::get().to(api_handlers::feedbacks))
                .service(
                    web::resource("/api/generate_preview")
                        .route(web::post().to(api_handlers::generate_preview))
                        .wrap(from_fn(require_json_content_type)),
                ),
        );
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("../templates/errors/404.html"))
}

/// Malformed JSON bodies get the same `{success, error}` shape as other API errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        let response = HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": message,
        }));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}
