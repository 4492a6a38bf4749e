use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use sqlx::types::Json;

use crate::errors::AppError;
use super::types::*;
use super::workflow::WorkflowError;

/// Upper bound on compare-and-swap attempts for one workflow mutation.
/// Each failed attempt means another writer committed in between.
pub const MAX_CAS_ATTEMPTS: usize = 8;

const SELECT_BID_TYPE: &str = "\
    SELECT id, name, description, statuses, transitions, \
           planned_reaction_time_minutes, planned_duration_minutes, \
           version, created_at, updated_at \
    FROM bid_types";

#[derive(sqlx::FromRow)]
struct Row {
    id: i64,
    name: String,
    description: Option<String>,
    statuses: Json<Vec<Status>>,
    transitions: Json<Vec<Transition>>,
    planned_reaction_time_minutes: Option<i32>,
    planned_duration_minutes: Option<i32>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Row> for BidType {
    fn from(r: Row) -> Self {
        BidType {
            id: r.id,
            name: r.name,
            description: r.description,
            statuses: r.statuses.0,
            transitions: r.transitions.0,
            planned_reaction_time_minutes: r.planned_reaction_time_minutes,
            planned_duration_minutes: r.planned_duration_minutes,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// All bid types, newest first.
pub async fn find_all(pool: &PgPool) -> Result<Vec<BidType>, AppError> {
    let rows = sqlx::query_as::<_, Row>(&format!("{SELECT_BID_TYPE} ORDER BY created_at DESC, id DESC"))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(BidType::from).collect())
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<BidType>, AppError> {
    let row = sqlx::query_as::<_, Row>(&format!("{SELECT_BID_TYPE} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(BidType::from))
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<BidType>, AppError> {
    let row = sqlx::query_as::<_, Row>(&format!("{SELECT_BID_TYPE} WHERE name = $1"))
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(BidType::from))
}

/// Create a bid type. The name must be unique across bid types.
pub async fn create(pool: &PgPool, form: &BidTypeForm) -> Result<BidType, AppError> {
    let row = sqlx::query_as::<_, Row>(
        "INSERT INTO bid_types \
             (name, description, statuses, transitions, \
              planned_reaction_time_minutes, planned_duration_minutes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, name, description, statuses, transitions, \
                   planned_reaction_time_minutes, planned_duration_minutes, \
                   version, created_at, updated_at",
    )
    .bind(&form.name)
    .bind(&form.description)
    .bind(Json(form.statuses.clone().unwrap_or_default()))
    .bind(Json(form.transitions.clone().unwrap_or_default()))
    .bind(form.planned_reaction_time_minutes)
    .bind(form.planned_duration_minutes)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::on_unique_violation(e, "Bid type with this name already exists"))?;

    log::info!("Created bid type {} '{}'", row.id, row.name);
    Ok(row.into())
}

/// Replace every field of a bid type. Bumps the version so in-flight
/// status/transition edits against the old document are retried.
pub async fn update(pool: &PgPool, id: i64, form: &BidTypeForm) -> Result<BidType, AppError> {
    let row = sqlx::query_as::<_, Row>(
        "UPDATE bid_types SET \
             name = $1, description = $2, statuses = $3, transitions = $4, \
             planned_reaction_time_minutes = $5, planned_duration_minutes = $6, \
             version = version + 1, updated_at = NOW() \
         WHERE id = $7 \
         RETURNING id, name, description, statuses, transitions, \
                   planned_reaction_time_minutes, planned_duration_minutes, \
                   version, created_at, updated_at",
    )
    .bind(&form.name)
    .bind(&form.description)
    .bind(Json(form.statuses.clone().unwrap_or_default()))
    .bind(Json(form.transitions.clone().unwrap_or_default()))
    .bind(form.planned_reaction_time_minutes)
    .bind(form.planned_duration_minutes)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::on_unique_violation(e, "Bid type with this name already exists"))?;

    let row = row.ok_or_else(|| AppError::not_found("Bid type"))?;
    log::info!("Updated bid type {} '{}'", row.id, row.name);
    Ok(row.into())
}

/// Delete a bid type and, with it, its whole workflow definition.
/// Bids of this type keep existing with no type.
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM bid_types WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Bid type"));
    }
    log::info!("Deleted bid type {id}");
    Ok(())
}

/// Load the workflow document and its version.
async fn load_workflow(pool: &PgPool, id: i64) -> Result<(Workflow, i64), AppError> {
    let row: Option<(Json<Vec<Status>>, Json<Vec<Transition>>, i64)> = sqlx::query_as(
        "SELECT statuses, transitions, version FROM bid_types WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let (statuses, transitions, version) = row.ok_or_else(|| AppError::not_found("Bid type"))?;
    Ok((Workflow::new(statuses.0, transitions.0), version))
}

/// Write the workflow back if the stored version is still `version`.
/// Returns `false` when another writer got there first.
async fn save_workflow<'c>(
    executor: impl PgExecutor<'c>,
    id: i64,
    version: i64,
    workflow: &Workflow,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE bid_types \
         SET statuses = $1, transitions = $2, version = version + 1, updated_at = NOW() \
         WHERE id = $3 AND version = $4",
    )
    .bind(Json(&workflow.statuses))
    .bind(Json(&workflow.transitions))
    .bind(id)
    .bind(version)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Read-modify-write of a bid type's workflow, guarded by its version.
///
/// `op` may run several times; on refusal nothing is written.
pub async fn modify_workflow<T, F>(pool: &PgPool, id: i64, mut op: F) -> Result<T, AppError>
where
    F: FnMut(&mut Workflow) -> Result<T, WorkflowError>,
{
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let (mut workflow, version) = load_workflow(pool, id).await?;
        let out = op(&mut workflow).inspect_err(|e| {
            log::warn!("Workflow change on bid type {id} refused: {e}");
        })?;

        if save_workflow(pool, id, version, &workflow).await? {
            return Ok(out);
        }
        log::warn!("Bid type {id} changed concurrently (attempt {attempt}/{MAX_CAS_ATTEMPTS}), retrying");
    }

    Err(AppError::Conflict(format!(
        "Bid type {id} was modified concurrently, please retry"
    )))
}

/// Statuses of a bid type ordered by position.
pub async fn list_statuses(pool: &PgPool, id: i64) -> Result<Vec<Status>, AppError> {
    let (workflow, _) = load_workflow(pool, id).await?;
    Ok(workflow.sorted_statuses())
}

pub async fn create_status(pool: &PgPool, id: i64, new: NewStatus) -> Result<Status, AppError> {
    let status = modify_workflow(pool, id, |wf| wf.add_status(new.clone())).await?;
    log::info!("Bid type {id}: added status '{}' at position {}", status.name, status.position);
    Ok(status)
}

/// Rename a status (and optionally replace its actions).
///
/// Bids of this type sitting in the old name are moved to the new one in the
/// same transaction as the workflow write.
pub async fn update_status(
    pool: &PgPool,
    id: i64,
    position: i32,
    update: StatusUpdate,
) -> Result<Status, AppError> {
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let (mut workflow, version) = load_workflow(pool, id).await?;
        let old_name = workflow.status_at(position).map(|s| s.name.clone());
        let status = workflow.update_status(position, update.clone()).inspect_err(|e| {
            log::warn!("Workflow change on bid type {id} refused: {e}");
        })?;

        let mut tx = pool.begin().await?;
        if !save_workflow(&mut *tx, id, version, &workflow).await? {
            log::warn!("Bid type {id} changed concurrently (attempt {attempt}/{MAX_CAS_ATTEMPTS}), retrying");
            continue;
        }
        let mut renamed = 0;
        if let Some(old_name) = old_name.filter(|old| *old != status.name) {
            renamed = sqlx::query(
                "UPDATE bids SET status = $1, updated_at = NOW() \
                 WHERE bid_type_id = $2 AND status = $3",
            )
            .bind(&status.name)
            .bind(id)
            .bind(&old_name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;

        log::info!(
            "Bid type {id}: updated status at position {position} to '{}' ({renamed} bids moved)",
            status.name
        );
        return Ok(status);
    }

    Err(AppError::Conflict(format!(
        "Bid type {id} was modified concurrently, please retry"
    )))
}

/// Remove a status. Transitions that reference it are kept.
pub async fn delete_status(pool: &PgPool, id: i64, position: i32) -> Result<Status, AppError> {
    let status = modify_workflow(pool, id, |wf| wf.remove_status(position)).await?;
    log::info!("Bid type {id}: removed status '{}' at position {position}", status.name);
    Ok(status)
}

pub async fn list_transitions(pool: &PgPool, id: i64) -> Result<Vec<Transition>, AppError> {
    let (workflow, _) = load_workflow(pool, id).await?;
    Ok(workflow.transitions)
}

pub async fn create_transition(
    pool: &PgPool,
    id: i64,
    transition: Transition,
) -> Result<Transition, AppError> {
    let created = modify_workflow(pool, id, |wf| wf.add_transition(transition)).await?;
    log::info!(
        "Bid type {id}: added transition {} -> {}",
        created.from_position,
        created.to_position
    );
    Ok(created)
}

pub async fn delete_transition(pool: &PgPool, id: i64, from: i32, to: i32) -> Result<(), AppError> {
    modify_workflow(pool, id, |wf| wf.remove_transition(from, to)).await?;
    log::info!("Bid type {id}: removed transition {from} -> {to}");
    Ok(())
}

/// Statuses reachable in one step from `position`.
pub async fn next_statuses(pool: &PgPool, id: i64, position: i32) -> Result<Vec<Status>, AppError> {
    let (workflow, _) = load_workflow(pool, id).await?;
    if workflow.status_at(position).is_none() {
        return Err(WorkflowError::StatusNotFound(position).into());
    }
    Ok(workflow.next_statuses(position))
}
