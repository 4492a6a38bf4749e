use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use crate::audit;
use crate::errors::AppError;
use crate::models::bid_type::{self, RoleRef, Status};
use crate::models::{notification, role, user};
use super::comments;
use super::queries::find_by_id;
use super::types::*;

pub const CREATED: &str = "bid.created";
pub const STATUS_CHANGED: &str = "bid.status_changed";
pub const COMMENT_DELETED: &str = "bid.comment_deleted";

/// Result of a status change: the updated bid and who was told about it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeOutcome {
    pub bid: Bid,
    pub from: String,
    pub to: String,
    pub notified_user_ids: Vec<i64>,
}

/// Human label for an allowed action code.
pub fn action_label(action: &str) -> &str {
    match action {
        "edit" => "Редактирование заявки",
        "assign_executor" => "Назначение исполнителя",
        "close" => "Закрытие заявки",
        other => other,
    }
}

/// Users to notify when a bid enters `status`: its responsible user if set,
/// otherwise every member of its responsible role.
async fn recipients(pool: &PgPool, status: &Status) -> Result<Vec<i64>, AppError> {
    if let Some(user_id) = status.responsible_user_id {
        return Ok(vec![user_id]);
    }
    let Some(role_ref) = &status.responsible_role_id else {
        return Ok(Vec::new());
    };
    match role::find_by_ref(pool, role_ref).await? {
        Some(r) => user::find_ids_by_role(pool, r.id).await,
        None => {
            let shown = match role_ref {
                RoleRef::Id(id) => id.to_string(),
                RoleRef::Name(name) => name.clone(),
            };
            log::warn!("Status '{}' names unknown responsible role '{shown}'", status.name);
            Ok(Vec::new())
        }
    }
}

/// Move a bid to the status named `target`.
///
/// When transitions are enforced and the bid has a type, the move must follow
/// an edge of the type's workflow. Bids without a type accept any status.
/// The update only applies if the bid is still in the status it was read in.
pub async fn change_status(
    pool: &PgPool,
    bid_id: i64,
    target: &str,
    actor_id: i64,
    policy: WorkflowPolicy,
) -> Result<StatusChangeOutcome, AppError> {
    let bid = find_by_id(pool, bid_id)
        .await?
        .ok_or_else(|| AppError::not_found("Bid"))?;
    let from = bid.status.clone();

    if from == target {
        return Ok(StatusChangeOutcome {
            bid,
            from: from.clone(),
            to: from,
            notified_user_ids: Vec::new(),
        });
    }

    let workflow = match bid.bid_type_id {
        Some(type_id) => bid_type::find_by_id(pool, type_id).await?.map(|bt| bt.workflow()),
        None => None,
    };
    let target_status: Option<Status> = match &workflow {
        Some(wf) if policy.enforce_transitions => Some(wf.check_status_change(&from, target)?.clone()),
        Some(wf) => wf.status_named(target).cloned(),
        None => None,
    };
    let responsible = target_status.as_ref().and_then(|s| s.responsible_user_id);

    let updated: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "UPDATE bids SET status = $1, current_responsible_user_id = $2, updated_at = NOW() \
         WHERE id = $3 AND status = $4 RETURNING updated_at",
    )
    .bind(target)
    .bind(responsible)
    .bind(bid_id)
    .bind(&from)
    .fetch_optional(pool)
    .await?;
    let Some((updated_at,)) = updated else {
        return Err(AppError::Conflict(format!(
            "Bid {bid_id} status changed concurrently, please retry"
        )));
    };
    log::info!("Bid {bid_id}: status '{from}' -> '{target}' by user {actor_id}");

    // The change is committed; nothing below may fail the call.
    let _ = audit::log(
        pool,
        Some(actor_id),
        STATUS_CHANGED,
        "bid",
        bid_id,
        json!({ "from": from, "to": target }),
    )
    .await;

    let mut notified = Vec::new();
    if let Some(status) = &target_status {
        let users = recipients(pool, status).await.unwrap_or_else(|e| {
            log::error!("Failed to resolve recipients for bid {bid_id} in '{target}': {e}");
            Vec::new()
        });
        let title = format!("Заявка #{bid_id}: {target}");
        let message = format!("Статус заявки \"{}\" изменен с \"{from}\" на \"{target}\"", bid.title);
        for user_id in users {
            if user_id == actor_id {
                continue;
            }
            match notification::create(pool, user_id, &title, &message, "status_change", Some(bid_id)).await {
                Ok(_) => notified.push(user_id),
                Err(e) => log::error!("Failed to notify user {user_id} about bid {bid_id}: {e}"),
            }
        }
    }

    let bid = Bid {
        status: target.to_string(),
        current_responsible_user_id: responsible,
        updated_at,
        ..bid
    };
    Ok(StatusChangeOutcome {
        bid,
        from,
        to: target.to_string(),
        notified_user_ids: notified,
    })
}

/// Statuses the bid may move to next. Empty for bids without a type; only the
/// open status for bids whose status is no longer part of the workflow.
pub async fn allowed_next_statuses(pool: &PgPool, bid_id: i64) -> Result<Vec<Status>, AppError> {
    let bid = find_by_id(pool, bid_id)
        .await?
        .ok_or_else(|| AppError::not_found("Bid"))?;
    let Some(type_id) = bid.bid_type_id else {
        return Ok(Vec::new());
    };
    let Some(bt) = bid_type::find_by_id(pool, type_id).await? else {
        return Ok(Vec::new());
    };
    Ok(bt.workflow().next_for_status_name(&bid.status))
}

/// Labels of the actions the bid's current status allows.
pub async fn necessary_actions(pool: &PgPool, bid: &Bid) -> Result<Vec<String>, AppError> {
    let Some(type_id) = bid.bid_type_id else {
        return Ok(Vec::new());
    };
    let Some(bt) = bid_type::find_by_id(pool, type_id).await? else {
        return Ok(Vec::new());
    };
    let workflow = bt.workflow();
    Ok(workflow
        .status_named(&bid.status)
        .map(|s| s.allowed_actions.iter().map(|a| action_label(a).to_string()).collect())
        .unwrap_or_default())
}

fn describe_audit(entry: &audit::AuditEntry) -> String {
    let details = &entry.details.0;
    let field = |k: &str| details.get(k).and_then(|v| v.as_str()).unwrap_or("");
    match entry.action.as_str() {
        STATUS_CHANGED => format!(
            "Изменение статуса: Статус изменен с \"{}\" на \"{}\"",
            field("from"),
            field("to")
        ),
        COMMENT_DELETED => format!("Удален комментарий: {}", field("content")),
        other => other.to_string(),
    }
}

/// Timeline of a bid: creation, comments and audited actions, oldest first.
pub async fn history(pool: &PgPool, bid_id: i64) -> Result<Vec<HistoryEntry>, AppError> {
    let bid = find_by_id(pool, bid_id)
        .await?
        .ok_or_else(|| AppError::not_found("Bid"))?;

    let mut entries = vec![HistoryEntry {
        date: bid.created_at,
        user: bid.creator_name.clone(),
        action: "Заявка создана".to_string(),
    }];

    for c in comments::list_comments(pool, bid_id).await? {
        entries.push(HistoryEntry {
            date: c.created_at,
            user: c.user_name,
            action: format!("Добавлен комментарий: {}", c.content),
        });
    }

    for entry in audit::find_for_target(pool, "bid", bid_id).await? {
        if entry.action == CREATED {
            continue;
        }
        entries.push(HistoryEntry {
            date: entry.created_at,
            user: entry.user_name.clone(),
            action: describe_audit(&entry),
        });
    }

    entries.sort_by_key(|e| e.date);
    Ok(entries)
}
