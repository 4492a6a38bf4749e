use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::api_types::page_offset;

/// Longest audit retention accepted, in days (100 years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Clamp a retention window to `1..=MAX_RETENTION_DAYS`.
pub fn clamp_retention_days(days: i64) -> i64 {
    days.clamp(1, MAX_RETENTION_DAYS)
}

#[derive(Debug)]
pub enum AuditError {
    DbError(sqlx::Error),
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        AuditError::DbError(err)
    }
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditError::DbError(e) => write!(f, "Database error: {}", e),
        }
    }
}

/// One audit log row, with the acting user's display name resolved.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub details: Json<Value>,
    pub created_at: DateTime<Utc>,
}

/// Record an action. Failures are logged here; callers usually ignore the result.
pub async fn log(
    pool: &PgPool,
    user_id: Option<i64>,
    action: &str,
    target_type: &str,
    target_id: i64,
    details: Value,
) -> Result<i64, AuditError> {
    let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
        "INSERT INTO audit_log (user_id, action, target_type, target_id, details) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(Json(&details))
    .fetch_one(pool)
    .await;

    match inserted {
        Ok((id,)) => Ok(id),
        Err(e) => {
            log::error!("Audit log for {action} on {target_type} {target_id} failed: {e}");
            Err(e.into())
        }
    }
}

/// Entries for one target, oldest first.
pub async fn find_for_target(
    pool: &PgPool,
    target_type: &str,
    target_id: i64,
) -> Result<Vec<AuditEntry>, AuditError> {
    let entries = sqlx::query_as::<_, AuditEntry>(
        "SELECT a.id, a.user_id, u.full_name AS user_name, a.action, a.target_type, \
                a.target_id, a.details, a.created_at \
         FROM audit_log a \
         LEFT JOIN users u ON u.id = a.user_id \
         WHERE a.target_type = $1 AND a.target_id = $2 \
         ORDER BY a.created_at, a.id",
    )
    .bind(target_type)
    .bind(target_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Filters for the audit log listing. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub action: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
}

/// Filtered page of audit entries, newest first, plus the total matching count.
pub async fn find_page(
    pool: &PgPool,
    filter: &AuditFilter,
    page: i64,
    per_page: i64,
) -> Result<(Vec<AuditEntry>, i64), AuditError> {
    let where_clause = "($1::TEXT IS NULL OR a.action = $1) \
                        AND ($2::TEXT IS NULL OR a.target_type = $2) \
                        AND ($3::BIGINT IS NULL OR a.target_id = $3)";

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM audit_log a WHERE {where_clause}"
    ))
    .bind(&filter.action)
    .bind(&filter.target_type)
    .bind(filter.target_id)
    .fetch_one(pool)
    .await?;

    let offset = page_offset(page, per_page);
    let entries = sqlx::query_as::<_, AuditEntry>(&format!(
        "SELECT a.id, a.user_id, u.full_name AS user_name, a.action, a.target_type, \
                a.target_id, a.details, a.created_at \
         FROM audit_log a \
         LEFT JOIN users u ON u.id = a.user_id \
         WHERE {where_clause} \
         ORDER BY a.created_at DESC, a.id DESC LIMIT $4 OFFSET $5"
    ))
    .bind(&filter.action)
    .bind(&filter.target_type)
    .bind(filter.target_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((entries, total))
}

/// Delete entries older than the retention window.
pub async fn cleanup_old_entries(pool: &PgPool, retention_days: i64) {
    let retention_days = clamp_retention_days(retention_days);
    let days = i32::try_from(retention_days).unwrap_or(i32::MAX);
    let result = sqlx::query(
        "DELETE FROM audit_log WHERE created_at < NOW() - make_interval(days => $1)",
    )
    .bind(days)
    .execute(pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() > 0 => {
            log::info!("Audit cleanup removed {} entries older than {retention_days} days", r.rows_affected());
        }
        Ok(_) => {}
        Err(e) => log::error!("Audit cleanup failed: {e}"),
    }
}
