use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use audit_cell::router::audit_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

struct Harness {
    server: MockServer,
    config: Arc<AppConfig>,
    token: String,
}

async fn harness(role: &str) -> Harness {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::admin("pedro@clinica.test");

    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::staff_profile_response(1, &user.id, role)
        ])))
        .mount(&server)
        .await;

    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));
    Harness { server, config, token }
}

fn app(config: Arc<AppConfig>) -> Router {
    Router::new().nest("/audit", audit_routes(config))
}

async fn send(
    h: &Harness,
    method_name: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method_name)
        .uri(uri)
        .header("authorization", format!("Bearer {}", h.token));
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app(h.config.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn audit_row(id: i64) -> Value {
    json!({
        "id": id,
        "occurred_at": "2025-01-15T12:00:00Z",
        "actor_id": "user-1",
        "actor_name": "Pedro Admin",
        "action": "crear",
        "module": "salas",
        "description": "Creó la sala Box 1",
        "details": null,
        "object_type": "sala",
        "object_id": "4",
        "ip_address": null
    })
}

#[tokio::test]
async fn admin_browses_paginated_log() {
    let h = harness("administrativo").await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/3"))
        .mount(&h.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/audit_logs"))
        .and(query_param("module", "eq.salas"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([audit_row(1)])))
        .mount(&h.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("active", "is.true"))
        .and(query_param("select", "user_id,full_name"))
        .and(query_param("order", "full_name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user_id": "user-2", "full_name": "Dra. Carla Soto" },
            { "user_id": "user-1", "full_name": "Pedro Admin" }
        ])))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = send(&h, "GET", "/audit?modulo=salas&page=abc", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"]["total"], 3);
    assert_eq!(body["entries"]["page"], 1);
    assert_eq!(body["entries"]["items"][0]["module"], "salas");
    assert_eq!(body["summary"]["total"], 3);
    assert_eq!(
        body["users"],
        json!([
            { "user_id": "user-2", "full_name": "Dra. Carla Soto" },
            { "user_id": "user-1", "full_name": "Pedro Admin" }
        ])
    );
    assert!(body["modules"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["value"] != "auditoria"));
}

#[tokio::test]
async fn dentists_cannot_browse_audit_log() {
    let h = harness("dentista").await;
    let (status, _) = send(&h, "GET", "/audit", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn clearing_requires_both_confirmations() {
    let h = harness("administrativo").await;

    let (status, body) = send(
        &h,
        "POST",
        "/audit/clear",
        Some(json!({ "confirmar": true, "eliminar_todo": false })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("confirmar"));
}

#[tokio::test]
async fn clearing_deletes_everything_and_records_the_wipe() {
    let h = harness("administrativo").await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/5"))
        .mount(&h.server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/audit_logs"))
        .and(query_param("id", "not.is.null"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([audit_row(99)])))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = send(
        &h,
        "POST",
        "/audit/clear",
        Some(json!({ "confirmar": true, "eliminar_todo": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_antes"], 5);
    assert_eq!(body["eliminados"], 5);
    assert_eq!(body["total_despues"], 0);
}

#[tokio::test]
async fn purge_rejects_short_retention() {
    let h = harness("administrativo").await;
    let (status, _) = send(&h, "POST", "/audit/purge", Some(json!({ "dias": 10 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h,
        "POST",
        "/audit/purge",
        Some(json!({ "dias": 90, "max_registros": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn purge_dry_run_only_counts() {
    let h = harness("administrativo").await;

    // Registered first so it wins over the bare table count.
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/audit_logs"))
        .and(wiremock::matchers::query_param_contains("occurred_at", "lt."))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/200"))
        .mount(&h.server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/150000"))
        .mount(&h.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/audit_logs"))
        .and(query_param("offset", "99999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "occurred_at": "2024-06-01T00:00:00Z" }
        ])))
        .mount(&h.server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&h.server)
        .await;

    let (status, body) = send(&h, "POST", "/audit/purge", Some(json!({ "dry_run": true }))).await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["report"];
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["total_before"], 150000);
    assert_eq!(report["removed_by_limit"], 200);
    assert_eq!(report["removed_by_age"], 200);
    assert_eq!(report["total_after"], 149600);
}
