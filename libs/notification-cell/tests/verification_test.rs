use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::router::notification_routes;
use shared_utils::test_utils::TestConfig;

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn issuing_a_code_stores_it_and_logs_in_dev_mode() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/rest/v1/verification_codes"))
        .and(body_partial_json(json!({ "email": "ana@example.com", "used": false })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = post_json(
        notification_routes(config),
        "/verification-code",
        json!({ "email": " Ana@Example.com " }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"]["enviado"], true);
    assert!(body["expires_at"].is_string());
    assert!(body.get("code").is_none());
}

#[tokio::test]
async fn issuing_rejects_malformed_email() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();

    let (status, _) = post_json(
        notification_routes(config),
        "/verification-code",
        json!({ "email": "nope" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verifying_consumes_matching_code() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/verification_codes"))
        .and(query_param("code", "eq.123456"))
        .and(query_param("used", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "used": true }])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/verification_codes"))
        .and(query_param("code", "eq.654321"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (status, body) = post_json(
        notification_routes(config.clone()),
        "/verification-code/verify",
        json!({ "email": "ana@example.com", "code": "123456" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, _) = post_json(
        notification_routes(config),
        "/verification-code/verify",
        json!({ "email": "ana@example.com", "code": "654321" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
