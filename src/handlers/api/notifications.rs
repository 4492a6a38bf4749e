use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::auth::session::require_user;
use crate::errors::AppError;
use crate::models::notification::{self, Notification, ReadFilter};

const DEFAULT_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    notifications: Vec<Notification>,
    unread_count: i64,
}

/// GET /api/notifications?filter=all|unread|read&limit=50
pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user(&session)?;
    let filter = query.filter.as_deref().map(ReadFilter::parse).unwrap_or_default();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 500);

    let notifications = notification::find_for_user(&pool, user_id, filter, limit).await?;
    let unread_count = notification::unread_count(&pool, user_id).await?;
    Ok(HttpResponse::Ok().json(ListResponse { notifications, unread_count }))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let user_id = require_user(&session)?;
    let count = notification::unread_count(&pool, user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "count": count })))
}

/// PUT /api/notifications/{id}/read
pub async fn mark_read(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user(&session)?;
    let updated = notification::mark_read(&pool, path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let user_id = require_user(&session)?;
    let changed = notification::mark_all_read(&pool, user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": changed })))
}

/// DELETE /api/notifications/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user(&session)?;
    notification::delete(&pool, path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
