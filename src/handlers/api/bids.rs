use std::collections::HashMap;

use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use crate::api_types::{page_params, PaginatedResponse};
use crate::audit;
use crate::auth::session::require_permission;
use crate::auth::validate;
use crate::errors::AppError;
use crate::models::bid::{self, Bid, BidFilter, BidForm, BidUpdate, CommentForm, StatusChange, WorkflowPolicy};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BidDetail {
    #[serde(flatten)]
    bid: Bid,
    necessary_actions: Vec<String>,
}

fn comment_content(form: &CommentForm) -> Result<String, AppError> {
    let content = form.content.trim().to_string();
    match validate::validate_required(&content, "Comment", 5000) {
        Some(e) => Err(AppError::Validation(vec![e])),
        None => Ok(content),
    }
}

/// GET /api/bids
/// Query params: status, bid_type_id, page (default 1), per_page (default 25)
pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bids.view")?;

    let (page, per_page) = page_params(&query);
    let filter = BidFilter {
        status: query.get("status").filter(|s| !s.is_empty()).cloned(),
        bid_type_id: query.get("bid_type_id").and_then(|v| v.parse().ok()),
    };
    let (items, total) = bid::find_page(&pool, &filter, page, per_page).await?;

    Ok(HttpResponse::Ok().json(PaginatedResponse { items, page, per_page, total }))
}

/// POST /api/bids
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    policy: web::Data<WorkflowPolicy>,
    body: web::Json<BidForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bids.edit")?;
    let mut form = body.into_inner();
    form.title = form.title.trim().to_string();
    if let Some(e) = validate::validate_required(&form.title, "Title", 255) {
        return Err(AppError::Validation(vec![e]));
    }

    let created = bid::create(&pool, &form, Some(user_id), **policy).await?;
    let _ = audit::log(&pool, Some(user_id), bid::CREATED, "bid", created.id,
        json!({ "title": created.title, "status": created.status })).await;
    Ok(HttpResponse::Created().json(created))
}

/// GET /api/bids/{id}
pub async fn read(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bids.view")?;
    let found = bid::find_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Bid"))?;
    let necessary_actions = bid::necessary_actions(&pool, &found).await?;
    Ok(HttpResponse::Ok().json(BidDetail { bid: found, necessary_actions }))
}

/// PUT /api/bids/{id}
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<BidUpdate>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bids.edit")?;
    let id = path.into_inner();
    let mut changes = body.into_inner();
    if let Some(title) = changes.title.as_mut() {
        *title = title.trim().to_string();
        if let Some(e) = validate::validate_required(title, "Title", 255) {
            return Err(AppError::Validation(vec![e]));
        }
    }

    let updated = bid::update(&pool, id, &changes).await?;
    let _ = audit::log(&pool, Some(user_id), "bid.updated", "bid", id, json!({})).await;
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/bids/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bids.delete")?;
    let id = path.into_inner();
    bid::delete(&pool, id).await?;
    let _ = audit::log(&pool, Some(user_id), "bid.deleted", "bid", id, json!({})).await;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /api/bids/{id}/status
pub async fn change_status(
    pool: web::Data<PgPool>,
    session: Session,
    policy: web::Data<WorkflowPolicy>,
    path: web::Path<i64>,
    body: web::Json<StatusChange>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bids.edit")?;
    let target = body.status.trim();
    if let Some(e) = validate::validate_required(target, "Status", 100) {
        return Err(AppError::Validation(vec![e]));
    }

    let outcome = bid::change_status(&pool, path.into_inner(), target, user_id, **policy).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /api/bids/{id}/transitions
pub async fn transitions(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bids.view")?;
    let next = bid::allowed_next_statuses(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(next))
}

/// GET /api/bids/{id}/history
pub async fn history(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bids.view")?;
    let entries = bid::history(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// GET /api/bids/{id}/comments
pub async fn list_comments(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "bids.view")?;
    let comments = bid::list_comments(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// POST /api/bids/{id}/comments
pub async fn add_comment(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<CommentForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bids.view")?;
    let content = comment_content(&body)?;
    let comment = bid::add_comment(&pool, path.into_inner(), user_id, &content).await?;
    Ok(HttpResponse::Created().json(comment))
}

/// PUT /api/bids/{id}/comments/{comment_id}
pub async fn update_comment(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    body: web::Json<CommentForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bids.view")?;
    let (bid_id, comment_id) = path.into_inner();
    let content = comment_content(&body)?;
    let comment = bid::update_comment(&pool, bid_id, comment_id, user_id, &content).await?;
    Ok(HttpResponse::Ok().json(comment))
}

/// DELETE /api/bids/{id}/comments/{comment_id}
pub async fn delete_comment(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_permission(&session, "bids.view")?;
    let (bid_id, comment_id) = path.into_inner();
    let removed = bid::delete_comment(&pool, bid_id, comment_id, user_id).await?;
    let _ = audit::log(&pool, Some(user_id), bid::COMMENT_DELETED, "bid", bid_id,
        json!({ "commentId": comment_id, "content": removed.content })).await;
    Ok(HttpResponse::NoContent().finish())
}
