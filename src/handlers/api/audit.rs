use std::collections::HashMap;

use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::api_types::{page_params, PaginatedResponse};
use crate::audit::{self, AuditFilter};
use crate::auth::session::require_permission;
use crate::errors::AppError;

/// GET /api/audit
/// Query params: action, target_type, target_id, page (default 1), per_page (default 25)
pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "audit.view")?;

    let (page, per_page) = page_params(&query);
    let text = |key: &str| query.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let filter = AuditFilter {
        action: text("action"),
        target_type: text("target_type"),
        target_id: query.get("target_id").and_then(|v| v.parse().ok()),
    };
    let (items, total) = audit::find_page(&pool, &filter, page, per_page).await?;

    Ok(HttpResponse::Ok().json(PaginatedResponse { items, page, per_page, total }))
}
