//! HTTP tests for the JSON API — session auth, permission checks, the JSON
//! mutation guard and the bid-type workflow endpoints end to end.

#[macro_use]
mod common;

use actix_web::http::{StatusCode, header::ContentType};
use actix_web::test;
use serde_json::{Value, json};

use navicon::models::bid::WorkflowPolicy;
use common::*;

#[actix_rt::test]
async fn test_health_is_public() {
    let Some(db) = setup_test_db().await else { return };
    let app = test_app!(db.pool());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "OK");
}

#[actix_rt::test]
async fn test_requires_session() {
    let Some(db) = setup_test_db().await else { return };
    let app = test_app!(db.pool());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/bid-types").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/me").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_login_and_me() {
    let Some(db) = setup_test_db_seeded().await else { return };
    let app = test_app!(db.pool());

    let bad = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": ADMIN_USER, "password": "wrong password" }))
        .to_request();
    assert_eq!(test::call_service(&app, bad).await.status(), StatusCode::UNAUTHORIZED);

    let cookie = login!(app, ADMIN_USER, ADMIN_PASS);
    let req = test::TestRequest::get().uri("/api/auth/me").cookie(cookie.clone()).to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["username"], ADMIN_USER);
    assert_eq!(me["roleName"], "Администратор");
    assert!(me["permissions"].as_array().is_some_and(|p| p.iter().any(|c| c == "bid_types.manage")));

    let logout = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(ContentType::json())
        .cookie(cookie)
        .to_request();
    assert_eq!(test::call_service(&app, logout).await.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_login_rate_limited() {
    let Some(db) = setup_test_db_seeded().await else { return };
    let app = test_app!(db.pool());

    let attempt = || {
        test::TestRequest::post()
            .uri("/api/auth/login")
            .peer_addr("10.1.2.3:4000".parse().expect("addr"))
            .set_json(json!({ "username": ADMIN_USER, "password": "nope nope" }))
            .to_request()
    };
    for _ in 0..5 {
        assert_eq!(test::call_service(&app, attempt()).await.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(test::call_service(&app, attempt()).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[actix_rt::test]
async fn test_mutations_require_json_content_type() {
    let Some(db) = setup_test_db_seeded().await else { return };
    let app = test_app!(db.pool());
    let cookie = login!(app, ADMIN_USER, ADMIN_PASS);

    let req = test::TestRequest::post()
        .uri("/api/bid-types")
        .insert_header(("content-type", "application/x-www-form-urlencoded"))
        .set_payload("name=x")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_permission_denied_without_code() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let viewer = create_role(pool, "Наблюдатель", &["bid_types.view"]).await;
    create_user(pool, "viewer", Some(viewer.id)).await;
    let app = test_app!(pool);
    let cookie = login!(app, "viewer", TEST_PASSWORD);

    let list = test::TestRequest::get().uri("/api/bid-types").cookie(cookie.clone()).to_request();
    assert_eq!(test::call_service(&app, list).await.status(), StatusCode::OK);

    let create = test::TestRequest::post()
        .uri("/api/bid-types")
        .set_json(json!({ "name": "Запрещено" }))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, create).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().is_some_and(|e| e.contains("bid_types.manage")));
}

#[actix_rt::test]
async fn test_bid_type_workflow_endpoints() {
    let Some(db) = setup_test_db_seeded().await else { return };
    let app = test_app!(db.pool());
    let cookie = login!(app, ADMIN_USER, ADMIN_PASS);

    let req = test::TestRequest::post()
        .uri("/api/bid-types")
        .set_json(json!({
            "name": "Настройка",
            "statuses": [
                { "name": "Открыта", "position": 1, "allowedActions": ["edit"] },
                { "name": "Закрыта", "position": 999 }
            ],
            "transitions": [{ "fromPosition": 1, "toPosition": 999 }],
            "plannedReactionTimeMinutes": 15
        }))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_i64().expect("id");
    let base = format!("/api/bid-types/{id}");

    let duplicate = test::TestRequest::post()
        .uri("/api/bid-types")
        .set_json(json!({ "name": "Настройка" }))
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, duplicate).await.status(), StatusCode::CONFLICT);

    let add = |name: &str, position: i32| {
        test::TestRequest::post()
            .uri(&format!("{base}/statuses"))
            .set_json(json!({ "name": name, "position": position, "color": "#3b82f6" }))
            .cookie(cookie.clone())
            .to_request()
    };
    assert_eq!(test::call_service(&app, add("Сборка", 2)).await.status(), StatusCode::CREATED);
    assert_eq!(test::call_service(&app, add("Другая", 2)).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(test::call_service(&app, add("Открыта", 5)).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri(&format!("{base}/statuses")).cookie(cookie.clone()).to_request();
    let statuses: Value = test::call_and_read_body_json(&app, req).await;
    let positions: Vec<i64> = statuses
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|s| s["position"].as_i64())
        .collect();
    assert_eq!(positions, vec![1, 2, 999]);

    let edge = test::TestRequest::post()
        .uri(&format!("{base}/transitions"))
        .set_json(json!({ "fromPosition": 1, "toPosition": 2 }))
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, edge).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri(&format!("{base}/statuses/1/next")).cookie(cookie.clone()).to_request();
    let next: Value = test::call_and_read_body_json(&app, req).await;
    let names: Vec<&str> = next.as_array().expect("array").iter().filter_map(|s| s["name"].as_str()).collect();
    assert_eq!(names, vec!["Сборка", "Закрыта"]);

    let protected = test::TestRequest::delete()
        .uri(&format!("{base}/statuses/999"))
        .insert_header(ContentType::json())
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, protected).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().is_some_and(|e| e.contains("Cannot delete")));

    let missing_edge = test::TestRequest::delete()
        .uri(&format!("{base}/transitions/2/1"))
        .insert_header(ContentType::json())
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, missing_edge).await.status(), StatusCode::NOT_FOUND);

    let remove = test::TestRequest::delete()
        .uri(&format!("{base}/statuses/2"))
        .insert_header(ContentType::json())
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, remove).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&format!("{base}/transitions")).cookie(cookie).to_request();
    let transitions: Value = test::call_and_read_body_json(&app, req).await;
    assert!(
        transitions
            .as_array()
            .expect("array")
            .contains(&json!({ "fromPosition": 1, "toPosition": 2 })),
        "orphan edge is kept"
    );
}

#[actix_rt::test]
async fn test_bid_status_change_over_http() {
    let Some(db) = setup_test_db_seeded().await else { return };
    let pool = db.pool();
    let bt = navicon::models::bid_type::find_by_name(pool, navicon::db::DEFAULT_BID_TYPE)
        .await
        .expect("query")
        .expect("seeded type");
    let app = test_app!(pool, WorkflowPolicy { enforce_transitions: true });
    let cookie = login!(app, ADMIN_USER, ADMIN_PASS);

    let req = test::TestRequest::post()
        .uri("/api/bids")
        .set_json(json!({ "title": "Выдать роутер", "bidTypeId": bt.id }))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["status"], "Открыта");
    assert_eq!(created["plannedDurationMinutes"], 1440);
    let id = created["id"].as_i64().expect("id");

    let req = test::TestRequest::get().uri(&format!("/api/bids/{id}")).cookie(cookie.clone()).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["necessaryActions"], json!(["Редактирование заявки"]));

    let change = |status: &str| {
        test::TestRequest::put()
            .uri(&format!("/api/bids/{id}/status"))
            .set_json(json!({ "status": status }))
            .cookie(cookie.clone())
            .to_request()
    };
    assert_eq!(test::call_service(&app, change("Закрыта")).await.status(), StatusCode::BAD_REQUEST);
    let resp = test::call_service(&app, change("Собрать")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome: Value = test::read_body_json(resp).await;
    assert_eq!(outcome["bid"]["status"], "Собрать");

    let req = test::TestRequest::get().uri(&format!("/api/bids/{id}/transitions")).cookie(cookie.clone()).to_request();
    let next: Value = test::call_and_read_body_json(&app, req).await;
    let names: Vec<&str> = next.as_array().expect("array").iter().filter_map(|s| s["name"].as_str()).collect();
    assert_eq!(names, vec!["Отложить", "Закрыта"]);

    let req = test::TestRequest::get().uri(&format!("/api/bids/{id}/history")).cookie(cookie.clone()).to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.as_array().map(|h| h.len()), Some(2));

    let req = test::TestRequest::get()
        .uri(&format!("/api/audit?target_type=bid&target_id={id}"))
        .cookie(cookie)
        .to_request();
    let audit: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(audit["total"], 2);
    assert_eq!(audit["items"][0]["action"], "bid.status_changed");
    assert_eq!(audit["items"][0]["details"], json!({ "from": "Открыта", "to": "Собрать" }));
}

#[actix_rt::test]
async fn test_huge_page_number_returns_empty_page() {
    let Some(db) = setup_test_db_seeded().await else { return };
    let app = test_app!(db.pool());
    let cookie = login!(app, ADMIN_USER, ADMIN_PASS);

    for uri in ["/api/bids?page=9223372036854775807", "/api/audit?page=9223372036854775807&per_page=100"] {
        let req = test::TestRequest::get().uri(uri).cookie(cookie.clone()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["items"], json!([]), "{uri}");
        assert_eq!(body["page"], json!(i64::MAX), "{uri}");
    }
}
