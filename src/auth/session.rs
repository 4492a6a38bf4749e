use actix_session::Session;

use crate::errors::AppError;

/// Permission codes of the logged-in user, stored in the session as CSV.
#[derive(Debug, Clone, Default)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|p| p == code)
    }

    pub fn from_csv(csv: &str) -> Self {
        let codes = csv
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Permissions(codes)
    }

    pub fn to_csv(&self) -> String {
        self.0.join(",")
    }
}

/// Store the identity of a freshly authenticated user.
pub fn start(
    session: &Session,
    user_id: i64,
    username: &str,
    role: Option<&str>,
    permissions: &Permissions,
) -> Result<(), AppError> {
    session.renew();
    session
        .insert("user_id", user_id)
        .and_then(|_| session.insert("username", username))
        .and_then(|_| session.insert("role", role.unwrap_or_default()))
        .and_then(|_| session.insert("permissions", permissions.to_csv()))
        .map_err(|e| AppError::Session(e.to_string()))
}

pub fn get_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>("user_id").unwrap_or(None)
}

/// The logged-in user's id, or `Unauthorized`.
pub fn require_user(session: &Session) -> Result<i64, AppError> {
    get_user_id(session).ok_or(AppError::Unauthorized)
}

pub fn get_username(session: &Session) -> Option<String> {
    session.get::<String>("username").unwrap_or(None)
}

pub fn get_permissions(session: &Session) -> Result<Permissions, AppError> {
    match session.get::<String>("permissions") {
        Ok(Some(csv)) => Ok(Permissions::from_csv(&csv)),
        Ok(None) => Ok(Permissions::default()),
        Err(e) => Err(AppError::Session(format!("Failed to get permissions: {e}"))),
    }
}

/// Check permission; returns the user id when granted.
pub fn require_permission(session: &Session, code: &str) -> Result<i64, AppError> {
    let user_id = require_user(session)?;
    if get_permissions(session)?.has(code) {
        Ok(user_id)
    } else {
        Err(AppError::PermissionDenied(code.to_string()))
    }
}
