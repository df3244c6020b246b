use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use monitoring_cell::monitoring_routes;
use shared_utils::test_utils::TestConfig;

async fn get_health(server: &MockServer) -> (StatusCode, Value) {
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let app = Router::new().nest("/health", monitoring_routes(config));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn reachable_database_reports_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let (status, body) = get_health(&server).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy", "checks": { "database": "ok" } }));
}

#[tokio::test]
async fn failing_database_reports_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let (status, body) = get_health(&server).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], json!("unhealthy"));
    assert!(body["checks"]["database"].as_str().unwrap().starts_with("error: "));
}
