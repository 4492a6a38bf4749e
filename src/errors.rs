use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use crate::api_types::ApiErrorResponse;
use crate::models::bid_type::WorkflowError;

#[derive(Debug)]
pub enum AppError {
    Db(sqlx::Error),
    Hash(String),
    Session(String),
    Unauthorized,
    PermissionDenied(String),
    NotFound(String),
    Validation(Vec<String>),
    Conflict(String),
    Workflow(WorkflowError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::Hash(e) => write!(f, "Hash error: {e}"),
            AppError::Session(e) => write!(f, "Session error: {e}"),
            AppError::Unauthorized => write!(f, "Authentication required"),
            AppError::PermissionDenied(code) => write!(f, "Permission denied: {code}"),
            AppError::NotFound(what) => write!(f, "{what} not found"),
            AppError::Validation(errors) => write!(f, "Validation failed: {}", errors.join("; ")),
            AppError::Conflict(msg) => write!(f, "{msg}"),
            AppError::Workflow(e) => write!(f, "{e}"),
        }
    }
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }

    /// Map a unique-constraint violation to `Conflict`, passing other errors through.
    pub fn on_unique_violation(e: sqlx::Error, msg: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(msg.to_string()),
            _ => AppError::Db(e),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Workflow(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            AppError::Workflow(_) => StatusCode::BAD_REQUEST,
            AppError::Db(_) | AppError::Hash(_) | AppError::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            AppError::Db(_) | AppError::Hash(_) | AppError::Session(_) => {
                log::error!("{self}");
                ApiErrorResponse::new("Internal server error")
            }
            AppError::Validation(errors) => ApiErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.join("; ")),
            },
            _ => ApiErrorResponse::new(&self.to_string()),
        };
        HttpResponse::build(status).json(body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Db(e)
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<crate::audit::AuditError> for AppError {
    fn from(e: crate::audit::AuditError) -> Self {
        match e {
            crate::audit::AuditError::DbError(e) => AppError::Db(e),
        }
    }
}
