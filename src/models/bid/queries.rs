use sqlx::PgPool;

use crate::api_types::page_offset;
use crate::errors::AppError;
use crate::models::bid_type::{self, WorkflowError};
use super::types::*;

const SELECT_BID: &str = "\
    SELECT b.id, b.title, b.description, b.amount, b.status, b.bid_type_id, \
           bt.name AS bid_type_name, \
           b.planned_reaction_time_minutes, b.planned_duration_minutes, \
           b.current_responsible_user_id, b.created_by, \
           u.full_name AS creator_name, b.created_at, b.updated_at \
    FROM bids b \
    LEFT JOIN bid_types bt ON bt.id = b.bid_type_id \
    LEFT JOIN users u ON u.id = b.created_by";

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Bid>, AppError> {
    let bid = sqlx::query_as::<_, Bid>(&format!("{SELECT_BID} WHERE b.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(bid)
}

/// Filtered page of bids, newest first, plus the total matching count.
pub async fn find_page(
    pool: &PgPool,
    filter: &BidFilter,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Bid>, i64), AppError> {
    let where_clause = "($1::TEXT IS NULL OR b.status = $1) \
                        AND ($2::BIGINT IS NULL OR b.bid_type_id = $2)";

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM bids b WHERE {where_clause}"
    ))
    .bind(&filter.status)
    .bind(filter.bid_type_id)
    .fetch_one(pool)
    .await?;

    let offset = page_offset(page, per_page);
    let items = sqlx::query_as::<_, Bid>(&format!(
        "{SELECT_BID} WHERE {where_clause} \
         ORDER BY b.created_at DESC, b.id DESC LIMIT $3 OFFSET $4"
    ))
    .bind(&filter.status)
    .bind(filter.bid_type_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((items, total))
}

/// Create a bid.
///
/// With a bid type, the status defaults to the type's open status and the SLA
/// fields default to the type's values. A requested status must belong to the
/// type when transitions are enforced.
pub async fn create(
    pool: &PgPool,
    form: &BidForm,
    created_by: Option<i64>,
    policy: WorkflowPolicy,
) -> Result<Bid, AppError> {
    let bid_type = match form.bid_type_id {
        Some(id) => Some(
            bid_type::find_by_id(pool, id)
                .await?
                .ok_or_else(|| AppError::not_found("Bid type"))?,
        ),
        None => None,
    };

    let workflow = bid_type.as_ref().map(|bt| bt.workflow());
    let status = match (&form.status, &workflow) {
        (Some(requested), Some(wf)) => {
            if policy.enforce_transitions && wf.status_named(requested).is_none() {
                return Err(WorkflowError::UnknownStatus(requested.clone()).into());
            }
            requested.clone()
        }
        (Some(requested), None) => requested.clone(),
        (None, Some(wf)) => wf
            .initial_status()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        (None, None) => DEFAULT_STATUS.to_string(),
    };

    let reaction = form
        .planned_reaction_time_minutes
        .or_else(|| bid_type.as_ref().and_then(|bt| bt.planned_reaction_time_minutes));
    let duration = form
        .planned_duration_minutes
        .or_else(|| bid_type.as_ref().and_then(|bt| bt.planned_duration_minutes));
    let responsible = workflow
        .as_ref()
        .and_then(|wf| wf.status_named(&status))
        .and_then(|s| s.responsible_user_id);

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO bids \
             (title, description, amount, status, bid_type_id, \
              planned_reaction_time_minutes, planned_duration_minutes, \
              current_responsible_user_id, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(&form.title)
    .bind(&form.description)
    .bind(form.amount.unwrap_or(0.0))
    .bind(&status)
    .bind(form.bid_type_id)
    .bind(reaction)
    .bind(duration)
    .bind(responsible)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    log::info!("Created bid {id} '{}' in status '{status}'", form.title);
    find_by_id(pool, id).await?.ok_or_else(|| AppError::not_found("Bid"))
}

pub async fn update(pool: &PgPool, id: i64, changes: &BidUpdate) -> Result<Bid, AppError> {
    let result = sqlx::query(
        "UPDATE bids SET \
             title = COALESCE($1, title), \
             description = COALESCE($2, description), \
             amount = COALESCE($3, amount), \
             planned_reaction_time_minutes = COALESCE($4, planned_reaction_time_minutes), \
             planned_duration_minutes = COALESCE($5, planned_duration_minutes), \
             current_responsible_user_id = COALESCE($6, current_responsible_user_id), \
             updated_at = NOW() \
         WHERE id = $7",
    )
    .bind(&changes.title)
    .bind(&changes.description)
    .bind(changes.amount)
    .bind(changes.planned_reaction_time_minutes)
    .bind(changes.planned_duration_minutes)
    .bind(changes.current_responsible_user_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Bid"));
    }
    log::info!("Updated bid {id}");
    find_by_id(pool, id).await?.ok_or_else(|| AppError::not_found("Bid"))
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM bids WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Bid"));
    }
    log::info!("Deleted bid {id}");
    Ok(())
}
