use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use talkback::auth::rate_limit::RateLimiter;
use talkback::briefing::generator::OpenAiGenerator;
use talkback::briefing::scheduler::spawn_scheduler;
use talkback::briefing::store::PgStore;
use talkback::briefing::Briefing;
use talkback::config::AppConfig;
use talkback::models::user;
use talkback::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let pool = db::init_pool(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;
    db::run_migrations(&pool).await.map_err(std::io::Error::other)?;

    match user::count(&pool).await {
        Ok(0) => log::info!("No accounts yet, the first registered user becomes admin"),
        Ok(n) => log::info!("{n} presenter account(s) registered"),
        Err(e) => log::warn!("Could not count users: {e}"),
    }

    let generator = OpenAiGenerator::new(config.openai.clone()).map_err(std::io::Error::other)?;
    let briefing = Arc::new(Briefing::new(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(generator),
        config.briefing.clone(),
    ));
    spawn_scheduler(briefing.clone(), config.scheduler_tick);
    log::info!(
        "Scheduler running every {}s, debounce {}s",
        config.scheduler_tick.as_secs(),
        config.briefing.debounce.as_secs()
    );

    // Sessions survive restarts only with a SESSION_KEY of 64+ bytes
    let secret_key = match config.session_key.as_deref() {
        Some(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Some(val) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
            Key::generate()
        }
        None => {
            log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
            Key::generate()
        }
    };

    let bind_addr = config.bind_addr.clone();
    let limiter = RateLimiter::new();
    let briefing_data = web::Data::from(briefing);
    let config_data = web::Data::new(config);

    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(
            CookieSessionStore::default(),
            secret_key.clone(),
        )
        .cookie_secure(false)
        .cookie_http_only(true)
        .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(briefing_data.clone())
            .app_data(config_data.clone())
            .app_data(web::Data::new(limiter.clone()))
            .app_data(routes::json_config())
            .service(actix_files::Files::new("/static", "./static"))
            .configure(routes::configure)
            // Default 404 handler (must be registered last)
            .default_service(web::to(routes::not_found))
    })
    .bind(bind_addr)?
    .run()
    .await
}
