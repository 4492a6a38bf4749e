use actix_session::Session;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::api_types::{ApiErrorResponse, MessageResponse};
use crate::audit;
use crate::auth::{password, rate_limit::RateLimiter, session};
use crate::errors::AppError;
use crate::models::user;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: user::UserDisplay,
    pub permissions: Vec<String>,
}

/// POST /api/auth/login
pub async fn login(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    session: Session,
    limiter: web::Data<RateLimiter>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    // Rate-limit check BEFORE any database access
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

    if limiter.is_blocked(ip) {
        log::warn!("Login blocked for {ip}: too many failed attempts");
        return Ok(HttpResponse::TooManyRequests().json(ApiErrorResponse::new(
            "Too many failed login attempts. Please try again later.",
        )));
    }

    let found = user::find_by_username(&pool, body.username.trim()).await?;
    let verified = match &found {
        Some(u) => password::verify_password(&body.password, &u.password)?,
        None => false,
    };
    let Some(u) = found.filter(|_| verified) else {
        limiter.record_failure(ip);
        log::warn!("Failed login for '{}' from {ip}", body.username);
        return Ok(HttpResponse::Unauthorized().json(ApiErrorResponse::new("Invalid username or password")));
    };

    limiter.clear(ip);
    let permissions = session::Permissions(user::find_permission_codes(&pool, u.id).await?);
    let display = user::find_display_by_id(&pool, u.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    session::start(&session, u.id, &u.username, display.role_name.as_deref(), &permissions)?;

    let _ = audit::log(&pool, Some(u.id), "user.login", "user", u.id, json!({ "ip": ip.to_string() })).await;
    log::info!("User '{}' logged in", u.username);

    Ok(HttpResponse::Ok().json(MeResponse { user: display, permissions: permissions.0 }))
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> HttpResponse {
    if let Some(name) = session::get_username(&session) {
        log::info!("User '{name}' logged out");
    }
    session.purge();
    HttpResponse::Ok().json(MessageResponse::new("Logged out"))
}

/// GET /api/auth/me
pub async fn me(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let user_id = session::require_user(&session)?;
    let display = user::find_display_by_id(&pool, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let permissions = session::get_permissions(&session)?;
    Ok(HttpResponse::Ok().json(MeResponse { user: display, permissions: permissions.0 }))
}
