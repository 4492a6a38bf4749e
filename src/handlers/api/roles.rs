use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::audit;
use crate::auth::session::require_permission;
use crate::auth::validate;
use crate::errors::AppError;
use crate::models::role::{self, RoleForm};

fn normalized(body: web::Json<RoleForm>) -> Result<RoleForm, AppError> {
    let mut form = body.into_inner();
    form.name = form.name.trim().to_string();
    form.permissions.retain(|p| !p.trim().is_empty());
    match validate::validate_required(&form.name, "Role name", 100) {
        Some(e) => Err(AppError::Validation(vec![e])),
        None => Ok(form),
    }
}

/// GET /api/roles
pub async fn list(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "roles.manage")?;
    Ok(HttpResponse::Ok().json(role::find_all(&pool).await?))
}

/// GET /api/roles/{id}
pub async fn read(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "roles.manage")?;
    let found = role::find_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Role"))?;
    Ok(HttpResponse::Ok().json(found))
}

/// POST /api/roles
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<RoleForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "roles.manage")?;
    let form = normalized(body)?;
    let created = role::create(&pool, &form).await?;
    let _ = audit::log(&pool, Some(user_id), "role.created", "role", created.id,
        json!({ "name": created.name })).await;
    Ok(HttpResponse::Created().json(created))
}

/// PUT /api/roles/{id}
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<RoleForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "roles.manage")?;
    let id = path.into_inner();
    let form = normalized(body)?;
    let updated = role::update(&pool, id, &form).await?;
    let _ = audit::log(&pool, Some(user_id), "role.updated", "role", id,
        json!({ "name": updated.name, "permissions": updated.permissions })).await;
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/roles/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "roles.manage")?;
    let id = path.into_inner();
    role::delete(&pool, id).await?;
    let _ = audit::log(&pool, Some(user_id), "role.deleted", "role", id, json!({})).await;
    Ok(HttpResponse::NoContent().finish())
}
