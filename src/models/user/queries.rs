use sqlx::PgPool;
use sqlx::types::Json;

use crate::errors::AppError;
use super::types::{NewUser, User, UserDisplay};

const SELECT_USER_DISPLAY: &str = "\
    SELECT u.id, u.username, u.email, u.full_name, u.role_id, \
           r.name AS role_name, u.created_at \
    FROM users u \
    LEFT JOIN roles r ON r.id = u.role_id";

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, full_name, role_id FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_display_by_id(pool: &PgPool, id: i64) -> Result<Option<UserDisplay>, AppError> {
    let user = sqlx::query_as::<_, UserDisplay>(&format!("{SELECT_USER_DISPLAY} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_all_display(pool: &PgPool) -> Result<Vec<UserDisplay>, AppError> {
    let users = sqlx::query_as::<_, UserDisplay>(&format!("{SELECT_USER_DISPLAY} ORDER BY u.id"))
        .fetch_all(pool)
        .await?;
    Ok(users)
}

/// Ids of every user holding the given role.
pub async fn find_ids_by_role(pool: &PgPool, role_id: i64) -> Result<Vec<i64>, AppError> {
    let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE role_id = $1 ORDER BY id")
        .bind(role_id)
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Permission codes granted to a user through their role (empty without a role).
pub async fn find_permission_codes(pool: &PgPool, user_id: i64) -> Result<Vec<String>, AppError> {
    let row: Option<(Json<Vec<String>>,)> = sqlx::query_as(
        "SELECT r.permissions FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(codes,)| codes.0).unwrap_or_default())
}

/// Create a user, returning the new id. Usernames are unique.
pub async fn create(pool: &PgPool, user: &NewUser) -> Result<i64, AppError> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (username, password, email, full_name, role_id) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(&user.username)
    .bind(&user.password)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(user.role_id)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::on_unique_violation(e, "Username already exists"))?;
    log::info!("Created user {id} '{}'", user.username);
    Ok(id)
}
