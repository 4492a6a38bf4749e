use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use crate::models::bid_type::{RoleRef, Status, Transition};

pub const ADMIN_ROLE: &str = "Администратор";
pub const WAREHOUSE_ROLE: &str = "Склад";
pub const DEFAULT_BID_TYPE: &str = "Выдача оборудования без преднастройки и монтажа";

/// Every permission code the API checks.
pub const ALL_PERMISSIONS: &[&str] = &[
    "bid_types.view",
    "bid_types.manage",
    "bids.view",
    "bids.edit",
    "bids.delete",
    "roles.manage",
    "users.manage",
    "audit.view",
];

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Database migrations complete");
    Ok(())
}

/// Statuses and transitions of the stock "equipment issue" bid type.
pub fn default_workflow() -> (Vec<Status>, Vec<Transition>) {
    let status = |name: &str, position: i32, actions: &[&str], color: Option<&str>| Status {
        name: name.to_string(),
        position,
        allowed_actions: actions.iter().map(|a| a.to_string()).collect(),
        color: color.map(String::from),
        responsible_role_id: None,
        responsible_user_id: None,
    };

    let mut open = status("Открыта", 1, &["edit"], None);
    open.responsible_role_id = Some(RoleRef::Name(WAREHOUSE_ROLE.to_string()));

    let statuses = vec![
        open,
        status("Собрать", 2, &["edit", "close"], Some("#3b82f6")),
        status("Отложить", 3, &[], Some("#eab308")),
        status("Закрыта", 999, &[], None),
    ];
    let transitions = [(1, 2), (1, 3), (2, 3), (2, 999)]
        .into_iter()
        .map(|(from_position, to_position)| Transition { from_position, to_position })
        .collect();
    (statuses, transitions)
}

/// Insert roles, the admin user and the default bid type. Skips whatever already exists.
pub async fn seed(pool: &PgPool, admin_password_hash: &str) -> Result<(), sqlx::Error> {
    let all: Vec<&str> = ALL_PERMISSIONS.to_vec();
    let warehouse = ["bid_types.view", "bids.view", "bids.edit"];

    for (name, description, permissions) in [
        (ADMIN_ROLE, "Полный доступ", json!(all)),
        (WAREHOUSE_ROLE, "Сотрудники склада", json!(warehouse)),
    ] {
        sqlx::query(
            "INSERT INTO roles (name, description, permissions) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(description)
        .bind(permissions)
        .execute(pool)
        .await?;
    }

    let created = sqlx::query(
        "INSERT INTO users (username, password, full_name, role_id) \
         SELECT 'admin', $1, 'Администратор', id FROM roles WHERE name = $2 \
         ON CONFLICT (username) DO NOTHING",
    )
    .bind(admin_password_hash)
    .bind(ADMIN_ROLE)
    .execute(pool)
    .await?;
    if created.rows_affected() > 0 {
        log::warn!("Created default admin user with the default password, change it");
    }

    let (statuses, transitions) = default_workflow();
    sqlx::query(
        "INSERT INTO bid_types \
             (name, description, statuses, transitions, \
              planned_reaction_time_minutes, planned_duration_minutes) \
         VALUES ($1, $2, $3, $4, 60, 1440) \
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(DEFAULT_BID_TYPE)
    .bind("Выдача оборудования со склада без дополнительных работ")
    .bind(Json(&statuses))
    .bind(Json(&transitions))
    .execute(pool)
    .await?;

    log::info!("Seed complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bid_type::Workflow;

    #[test]
    fn default_workflow_is_consistent() {
        let (statuses, transitions) = default_workflow();
        let wf = Workflow::new(statuses, transitions);

        assert_eq!(wf.initial_status().map(|s| s.name.as_str()), Some("Открыта"));
        assert!(wf.status_at(999).is_some());
        let next: Vec<_> = wf.next_statuses(2).into_iter().map(|s| s.name).collect();
        assert_eq!(next, vec!["Отложить", "Закрыта"]);
        assert!(wf.next_statuses(999).is_empty());
        assert!(wf.status_at(2).is_some_and(|s| s.allows("close")));
    }
}
