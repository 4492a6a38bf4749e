use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub bid_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Which notifications to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl ReadFilter {
    pub fn parse(s: &str) -> Self {
        match s {
            "unread" => ReadFilter::Unread,
            "read" => ReadFilter::Read,
            _ => ReadFilter::All,
        }
    }
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, kind, bid_id, is_read, created_at";

pub async fn create(
    pool: &PgPool,
    user_id: i64,
    title: &str,
    message: &str,
    kind: &str,
    bid_id: Option<i64>,
) -> Result<Notification, AppError> {
    let n = sqlx::query_as::<_, Notification>(&format!(
        "INSERT INTO notifications (user_id, title, message, kind, bid_id) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(kind)
    .bind(bid_id)
    .fetch_one(pool)
    .await?;
    Ok(n)
}

/// Newest first, at most `limit` entries.
pub async fn find_for_user(
    pool: &PgPool,
    user_id: i64,
    filter: ReadFilter,
    limit: i64,
) -> Result<Vec<Notification>, AppError> {
    let read_clause = match filter {
        ReadFilter::All => "",
        ReadFilter::Unread => " AND is_read = FALSE",
        ReadFilter::Read => " AND is_read = TRUE",
    };
    let items = sqlx::query_as::<_, Notification>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
         WHERE user_id = $1{read_clause} \
         ORDER BY created_at DESC, id DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn unread_count(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Mark one of the user's notifications as read. Other users' notifications are not found.
pub async fn mark_read(pool: &PgPool, id: i64, user_id: i64) -> Result<Notification, AppError> {
    let n = sqlx::query_as::<_, Notification>(&format!(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 \
         RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    n.ok_or_else(|| AppError::not_found("Notification"))
}

/// Returns how many notifications changed.
pub async fn mark_all_read(pool: &PgPool, user_id: i64) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &PgPool, id: i64, user_id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Notification"));
    }
    Ok(())
}
