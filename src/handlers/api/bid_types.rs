use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::audit;
use crate::auth::session::require_permission;
use crate::auth::validate;
use crate::errors::AppError;
use crate::models::bid_type::{self, BidTypeForm, NewStatus, StatusUpdate, Transition};

fn validate_form(form: &BidTypeForm) -> Result<(), AppError> {
    let errors: Vec<String> = validate::validate_required(&form.name, "Name", 255)
        .into_iter()
        .chain(
            [form.planned_reaction_time_minutes, form.planned_duration_minutes]
                .into_iter()
                .flatten()
                .filter(|m| *m < 0)
                .map(|_| "SLA minutes must not be negative".to_string()),
        )
        .collect();
    if errors.is_empty() { Ok(()) } else { Err(AppError::Validation(errors)) }
}

/// GET /api/bid-types
pub async fn list(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bid_types.view")?;
    let types = bid_type::find_all(&pool).await?;
    Ok(HttpResponse::Ok().json(types))
}

/// POST /api/bid-types
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<BidTypeForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let mut form = body.into_inner();
    form.name = form.name.trim().to_string();
    validate_form(&form)?;

    let created = bid_type::create(&pool, &form).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.created", "bid_type", created.id,
        json!({ "name": created.name })).await;
    Ok(HttpResponse::Created().json(created))
}

/// GET /api/bid-types/{id}
pub async fn read(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bid_types.view")?;
    let found = bid_type::find_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Bid type"))?;
    Ok(HttpResponse::Ok().json(found))
}

/// PUT /api/bid-types/{id}
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<BidTypeForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let id = path.into_inner();
    let mut form = body.into_inner();
    form.name = form.name.trim().to_string();
    validate_form(&form)?;

    let updated = bid_type::update(&pool, id, &form).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.updated", "bid_type", id,
        json!({ "name": updated.name })).await;
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/bid-types/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let id = path.into_inner();
    bid_type::delete(&pool, id).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.deleted", "bid_type", id, json!({})).await;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/bid-types/{id}/statuses
pub async fn list_statuses(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bid_types.view")?;
    let statuses = bid_type::list_statuses(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(statuses))
}

/// POST /api/bid-types/{id}/statuses
pub async fn create_status(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<NewStatus>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let id = path.into_inner();
    let mut new = body.into_inner();
    new.name = new.name.trim().to_string();

    let errors: Vec<String> = validate::validate_required(&new.name, "Status name", 100)
        .into_iter()
        .chain(validate::validate_color(new.color.as_deref()))
        .collect();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let status = bid_type::create_status(&pool, id, new).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.status_created", "bid_type", id,
        json!({ "name": status.name, "position": status.position })).await;
    Ok(HttpResponse::Created().json(status))
}

/// PUT /api/bid-types/{id}/statuses/{position}
pub async fn update_status(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i32)>,
    body: web::Json<StatusUpdate>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let (id, position) = path.into_inner();
    let mut update = body.into_inner();
    update.name = update.name.trim().to_string();
    if let Some(e) = validate::validate_required(&update.name, "Status name", 100) {
        return Err(AppError::Validation(vec![e]));
    }

    let status = bid_type::update_status(&pool, id, position, update).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.status_updated", "bid_type", id,
        json!({ "name": status.name, "position": position })).await;
    Ok(HttpResponse::Ok().json(status))
}

/// DELETE /api/bid-types/{id}/statuses/{position}
pub async fn delete_status(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i32)>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let (id, position) = path.into_inner();
    let removed = bid_type::delete_status(&pool, id, position).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.status_deleted", "bid_type", id,
        json!({ "name": removed.name, "position": position })).await;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/bid-types/{id}/statuses/{position}/next
pub async fn next_statuses(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i32)>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bid_types.view")?;
    let (id, position) = path.into_inner();
    let next = bid_type::next_statuses(&pool, id, position).await?;
    Ok(HttpResponse::Ok().json(next))
}

/// GET /api/bid-types/{id}/transitions
pub async fn list_transitions(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bid_types.view")?;
    let transitions = bid_type::list_transitions(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transitions))
}

/// POST /api/bid-types/{id}/transitions
pub async fn create_transition(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<Transition>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let id = path.into_inner();
    let created = bid_type::create_transition(&pool, id, body.into_inner()).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.transition_created", "bid_type", id,
        json!({ "from": created.from_position, "to": created.to_position })).await;
    Ok(HttpResponse::Created().json(created))
}

/// DELETE /api/bid-types/{id}/transitions/{from}/{to}
pub async fn delete_transition(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i32, i32)>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bid_types.manage")?;
    let (id, from, to) = path.into_inner();
    bid_type::delete_transition(&pool, id, from, to).await?;
    let _ = audit::log(&pool, Some(user_id), "bid_type.transition_deleted", "bid_type", id,
        json!({ "from": from, "to": to })).await;
    Ok(HttpResponse::NoContent().finish())
}
