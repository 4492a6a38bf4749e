//! Shared test infrastructure for model and API tests.
//!
//! Every test gets its own PostgreSQL schema on the server named by
//! `TEST_DATABASE_URL`, with all migrations applied. Without that variable
//! the tests print a SKIP line and return early.
//!
//! # Test Database Setup
//! - `setup_test_db()` - empty schema with migrations
//! - `setup_test_db_seeded()` - schema + default roles, admin user and bid type
#![allow(dead_code)]

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use navicon::auth::password;
use navicon::db;
use navicon::models::bid_type::{self, BidType, BidTypeForm};
use navicon::models::role::{self, Role, RoleForm};
use navicon::models::user::{self, NewUser};

// ============================================================================
// TEST CONSTANTS
// ============================================================================

pub const ENV_TEST_DB_URL: &str = "TEST_DATABASE_URL";
pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "admin123";
pub const TEST_PASSWORD: &str = "password123";

// ============================================================================
// DATABASE SETUP
// ============================================================================

pub struct TestDb {
    pool: PgPool,
    url: String,
    pub schema: String,
}

impl TestDb {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Drops the test schema. Runs on its own thread and runtime because the
/// test's runtime may be the one currently dropping us.
impl Drop for TestDb {
    fn drop(&mut self) {
        let url = self.url.clone();
        let schema = self.schema.clone();
        let teardown = std::thread::spawn(move || -> Result<(), BoxError> {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            rt.block_on(async {
                let admin = PgPoolOptions::new().max_connections(1).connect(&url).await?;
                sqlx::query(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
                    .execute(&admin)
                    .await?;
                admin.close().await;
                Ok::<_, BoxError>(())
            })
        });
        match teardown.join() {
            Ok(Err(e)) => eprintln!("Failed to drop test schema {}: {e}", self.schema),
            Err(_) => eprintln!("Test schema teardown panicked for {}", self.schema),
            Ok(Ok(())) => {}
        }
    }
}

fn db_url_or_skip() -> Option<String> {
    match std::env::var(ENV_TEST_DB_URL) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => {
            println!("SKIP: requires {ENV_TEST_DB_URL}");
            None
        }
    }
}

/// Fresh schema with migrations applied, or `None` when no test database is configured.
pub async fn setup_test_db() -> Option<TestDb> {
    let url = db_url_or_skip()?;
    let schema = format!("navicon_test_{}", hex::encode(rand::random::<[u8; 6]>()));

    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("Failed to create test schema");
    admin.close().await;

    let search_path = schema.clone();
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                sqlx::query(&format!("SET search_path TO {search_path}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .expect("Failed to open test pool");

    db::run_migrations(&pool).await.expect("Failed to run migrations");

    Some(TestDb { pool, url, schema })
}

/// Schema plus the stock seed (roles, `admin`/`admin123`, default bid type).
pub async fn setup_test_db_seeded() -> Option<TestDb> {
    let db = setup_test_db().await?;
    let hash = password::hash_password(ADMIN_PASS).expect("Failed to hash password");
    db::seed(db.pool(), &hash).await.expect("Failed to seed");
    Some(db)
}

// ============================================================================
// FIXTURES
// ============================================================================

pub async fn create_role(pool: &PgPool, name: &str, permissions: &[&str]) -> Role {
    let form = RoleForm {
        name: name.to_string(),
        description: None,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    };
    role::create(pool, &form).await.expect("Failed to create role")
}

/// Create a user with `TEST_PASSWORD`; returns the id.
pub async fn create_user(pool: &PgPool, username: &str, role_id: Option<i64>) -> i64 {
    let new_user = NewUser {
        username: username.to_string(),
        password: password::hash_password(TEST_PASSWORD).expect("Failed to hash password"),
        email: None,
        full_name: format!("{username} full name"),
        role_id,
    };
    user::create(pool, &new_user).await.expect("Failed to create user")
}

/// Bid type with the stock four-status workflow and SLA 60 / 1440.
pub async fn create_bid_type(pool: &PgPool, name: &str) -> BidType {
    let (statuses, transitions) = db::default_workflow();
    let form = BidTypeForm {
        name: name.to_string(),
        description: Some("test type".to_string()),
        statuses: Some(statuses),
        transitions: Some(transitions),
        planned_reaction_time_minutes: Some(60),
        planned_duration_minutes: Some(1440),
    };
    bid_type::create(pool, &form).await.expect("Failed to create bid type")
}

/// Bid type with no statuses or transitions.
pub async fn create_empty_bid_type(pool: &PgPool, name: &str) -> BidType {
    let form = BidTypeForm {
        name: name.to_string(),
        description: None,
        statuses: None,
        transitions: None,
        planned_reaction_time_minutes: None,
        planned_duration_minutes: None,
    };
    bid_type::create(pool, &form).await.expect("Failed to create bid type")
}

// ============================================================================
// HTTP
// ============================================================================

/// Build an actix test service with the session middleware and the `/api` routes.
#[macro_export]
macro_rules! test_app {
    ($pool:expr) => {
        $crate::test_app!($pool, navicon::models::bid::WorkflowPolicy::default())
    };
    ($pool:expr, $policy:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(
                    actix_session::SessionMiddleware::builder(
                        actix_session::storage::CookieSessionStore::default(),
                        actix_web::cookie::Key::generate(),
                    )
                    .cookie_secure(false)
                    .build(),
                )
                .app_data(actix_web::web::Data::new($pool.clone()))
                .app_data(actix_web::web::Data::new($policy))
                .app_data(actix_web::web::Data::new(navicon::auth::rate_limit::RateLimiter::new()))
                .service(actix_web::web::scope("/api").configure(navicon::handlers::api::configure)),
        )
        .await
    };
}

/// Log in through the API and return the session cookie.
#[macro_export]
macro_rules! login {
    ($app:expr, $username:expr, $password:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({ "username": $username, "password": $password }))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK, "login failed");
        resp.response()
            .cookies()
            .next()
            .expect("login sets a session cookie")
            .into_owned()
    }};
}
