use std::env;
use std::path::PathBuf;

use crate::audit;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub session_key: Option<String>,
    pub enforce_transitions: bool,
    pub backup_dir: PathBuf,
    pub backup_hour: u32,
    pub audit_retention_days: i64,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let backup_hour = parse_or("BACKUP_HOUR", 2u32);
        let backup_hour = if backup_hour > 23 {
            log::warn!("BACKUP_HOUR={backup_hour} is out of range, using 2");
            2
        } else {
            backup_hour
        };

        let audit_retention_days = parse_or("AUDIT_RETENTION_DAYS", 365i64);
        let clamped = audit::clamp_retention_days(audit_retention_days);
        if clamped != audit_retention_days {
            log::warn!("AUDIT_RETENTION_DAYS={audit_retention_days} is out of range, using {clamped}");
        }

        Ok(AppConfig {
            database_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            session_key: env::var("SESSION_KEY").ok(),
            enforce_transitions: parse_bool("WORKFLOW_ENFORCE_TRANSITIONS", true),
            backup_dir: PathBuf::from(env::var("BACKUP_DIR").unwrap_or_else(|_| "backups".to_string())),
            backup_hour,
            audit_retention_days: clamped,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 8u32),
        })
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{key}={raw} is not valid, using {default}");
            default
        }),
        Err(_) => default,
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                log::warn!("{key}={raw} is not a boolean, using {default}");
                default
            }
        },
        Err(_) => default,
    }
}
