use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::audit;
use crate::auth::session::require_permission;
use crate::auth::{password, validate};
use crate::errors::AppError;
use crate::models::role;
use crate::models::user::{self, NewUser, UserForm};

/// GET /api/users
pub async fn list(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    Ok(HttpResponse::Ok().json(user::find_all_display(&pool).await?))
}

/// GET /api/users/{id}
pub async fn read(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    let found = user::find_display_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(HttpResponse::Ok().json(found))
}

/// POST /api/users
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<UserForm>,
) -> Result<HttpResponse, AppError> {
    let actor_id = require_permission(&session, "users.manage")?;

    let mut errors = Vec::new();
    errors.extend(validate::validate_username(&body.username));
    errors.extend(validate::validate_password(&body.password));
    if let Some(role_id) = body.role_id {
        if role::find_by_id(&pool, role_id).await?.is_none() {
            errors.push(format!("Role {role_id} does not exist"));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let new_user = NewUser {
        username: body.username.trim().to_string(),
        password: password::hash_password(&body.password)?,
        email: body.email.clone().filter(|e| !e.trim().is_empty()),
        full_name: body.full_name.trim().to_string(),
        role_id: body.role_id,
    };
    let id = user::create(&pool, &new_user).await?;
    let _ = audit::log(&pool, Some(actor_id), "user.created", "user", id,
        json!({ "username": new_user.username })).await;

    let created = user::find_display_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(HttpResponse::Created().json(created))
}
