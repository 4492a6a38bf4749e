use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use navicon::api_types::ApiErrorResponse;
use navicon::auth::{self, rate_limit::RateLimiter};
use navicon::config::AppConfig;
use navicon::models::bid::WorkflowPolicy;
use navicon::{audit, backup, db, handlers};

fn io_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {e}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env().map_err(|e| io_error("Invalid configuration", e))?;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| io_error("Failed to connect to database", e))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| io_error("Failed to run migrations", e))?;

    let admin_hash = auth::password::hash_password("admin123")
        .map_err(|e| io_error("Failed to hash default password", e))?;
    db::seed(&pool, &admin_hash)
        .await
        .map_err(|e| io_error("Failed to seed database", e))?;

    // Clean up old audit entries based on retention policy
    audit::cleanup_old_entries(&pool, config.audit_retention_days).await;

    backup::spawn_scheduler(
        pool.clone(),
        config.database_url.clone(),
        config.backup_dir.clone(),
        config.backup_hour,
        config.audit_retention_days,
    );

    // Session encryption key — load from SESSION_KEY env var for persistent sessions across restarts
    let secret_key = match &config.session_key {
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

    let policy = WorkflowPolicy { enforce_transitions: config.enforce_transitions };
    if !policy.enforce_transitions {
        log::warn!("Workflow transitions are NOT enforced: bids accept any status");
    }
    let limiter = RateLimiter::new();

    log::info!("Starting server at http://{}", config.bind_addr);

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
            .app_data(web::Data::new(policy))
            .app_data(web::Data::new(limiter.clone()))
            .service(web::scope("/api").configure(handlers::api::configure))
            .default_service(web::to(|| async {
                actix_web::HttpResponse::NotFound().json(ApiErrorResponse::new("Not found"))
            }))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
