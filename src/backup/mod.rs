use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use sqlx::PgPool;
use tokio::process::Command;

use crate::audit;

/// Time until the next occurrence of `hour:00` local time.
pub fn until_next_run(now: DateTime<Local>, hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at);
    let mut next = Local.from_local_datetime(&today).earliest();
    if next.is_none_or(|t| t <= now) {
        let tomorrow = today + chrono::Duration::days(1);
        next = Local.from_local_datetime(&tomorrow).earliest();
    }
    next.and_then(|t| (t - now).to_std().ok())
        .unwrap_or(Duration::from_secs(24 * 60 * 60))
}

pub fn backup_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("scheduled-backup-{}.dump", now.format("%Y-%m-%dT%H-%M-%S")))
}

/// Dump the database with `pg_dump` in custom format.
pub async fn run_backup(database_url: &str, dir: &Path) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    let path = backup_path(dir, Local::now());

    let output = Command::new("pg_dump")
        .arg("--format=c")
        .arg("--compress=9")
        .arg("--file")
        .arg(&path)
        .arg(database_url)
        .output()
        .await
        .map_err(|e| format!("failed to start pg_dump: {e}"))?;

    if output.status.success() {
        Ok(path)
    } else {
        Err(format!(
            "pg_dump exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

/// Nightly backup plus audit log cleanup.
pub fn spawn_scheduler(pool: PgPool, database_url: String, dir: PathBuf, hour: u32, retention_days: i64) {
    actix_web::rt::spawn(async move {
        loop {
            let wait = until_next_run(Local::now(), hour);
            log::info!("Next scheduled backup in {} minutes", wait.as_secs() / 60);
            tokio::time::sleep(wait).await;

            match run_backup(&database_url, &dir).await {
                Ok(path) => log::info!("Scheduled backup written to {}", path.display()),
                Err(e) => log::error!("Scheduled backup failed: {e}"),
            }
            audit::cleanup_old_entries(&pool, retention_days).await;
        }
    });
}
