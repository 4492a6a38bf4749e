use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal user struct for authentication — includes password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role_id: Option<i64>,
}

/// Safe version for API responses — no password hash, includes role name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserDisplay {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: String,
    pub role_id: Option<i64>,
    pub role_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New user data for creation. `password` is already hashed.
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub full_name: String,
    pub role_id: Option<i64>,
}

/// Create-user request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: String,
    pub role_id: Option<i64>,
}
