use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::errors::AppError;
use crate::models::bid_type::RoleRef;
use super::types::*;

#[derive(sqlx::FromRow)]
struct Row {
    id: i64,
    name: String,
    description: Option<String>,
    permissions: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Row> for Role {
    fn from(r: Row) -> Self {
        Role {
            id: r.id,
            name: r.name,
            description: r.description,
            permissions: r.permissions.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const ROLE_COLUMNS: &str = "id, name, description, permissions, created_at, updated_at";

/// All roles, newest first.
pub async fn find_all(pool: &PgPool) -> Result<Vec<Role>, AppError> {
    let rows = sqlx::query_as::<_, Row>(&format!(
        "SELECT {ROLE_COLUMNS} FROM roles ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Role::from).collect())
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Role>, AppError> {
    let row = sqlx::query_as::<_, Row>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Role::from))
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>, AppError> {
    let row = sqlx::query_as::<_, Row>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"))
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Role::from))
}

/// Resolve a status' responsible role, given either by id or by name.
pub async fn find_by_ref(pool: &PgPool, role: &RoleRef) -> Result<Option<Role>, AppError> {
    match role {
        RoleRef::Id(id) => find_by_id(pool, *id).await,
        RoleRef::Name(name) => find_by_name(pool, name).await,
    }
}

pub async fn create(pool: &PgPool, form: &RoleForm) -> Result<Role, AppError> {
    let row = sqlx::query_as::<_, Row>(&format!(
        "INSERT INTO roles (name, description, permissions) VALUES ($1, $2, $3) \
         RETURNING {ROLE_COLUMNS}"
    ))
    .bind(&form.name)
    .bind(&form.description)
    .bind(Json(&form.permissions))
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::on_unique_violation(e, "Role name already exists"))?;
    log::info!("Created role {} '{}'", row.id, row.name);
    Ok(row.into())
}

pub async fn update(pool: &PgPool, id: i64, form: &RoleForm) -> Result<Role, AppError> {
    let row = sqlx::query_as::<_, Row>(&format!(
        "UPDATE roles SET name = $1, description = $2, permissions = $3, updated_at = NOW() \
         WHERE id = $4 RETURNING {ROLE_COLUMNS}"
    ))
    .bind(&form.name)
    .bind(&form.description)
    .bind(Json(&form.permissions))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::on_unique_violation(e, "Role name already exists"))?;
    row.map(Role::from).ok_or_else(|| AppError::not_found("Role"))
}

/// Delete a role. Users holding it are left without a role.
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Role"));
    }
    log::info!("Deleted role {id}");
    Ok(())
}
