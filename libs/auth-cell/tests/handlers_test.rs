use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware,
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::guards::{require_admin, require_patient, require_staff};
use auth_cell::handlers::{validate_token, verify_token};
use auth_cell::router::auth_routes;
use shared_models::auth::{PatientPrincipal, StaffPrincipal};
use shared_models::error::AppError;
use shared_utils::extractor::auth_middleware;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn auth_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

async fn mount_staff(server: &MockServer, user_id: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

async fn mount_patient(server: &MockServer, user_id: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/client_accounts"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

fn guarded_app(config: Arc<shared_config::AppConfig>) -> Router {
    let staff = Router::new()
        .route(
            "/staff",
            get(|Extension(staff): Extension<StaffPrincipal>| async move { staff.full_name }),
        )
        .layer(middleware::from_fn_with_state(config.clone(), require_staff));
    let admin = Router::new()
        .route("/admin", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(config.clone(), require_admin));
    let patient = Router::new()
        .route(
            "/patient",
            get(|Extension(patient): Extension<PatientPrincipal>| async move { patient.email }),
        )
        .layer(middleware::from_fn_with_state(config.clone(), require_patient));

    Router::new()
        .merge(staff)
        .merge(admin)
        .merge(patient)
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}

async fn call(app: Router, uri: &str, token: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn validate_token_returns_claims() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::patient("ana@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let response = validate_token(State(config), auth_headers(&token)).await.unwrap().0;

    assert!(response.valid);
    assert_eq!(response.user_id, user.id);
    assert_eq!(response.email.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn validate_token_rejects_missing_and_malformed_headers() {
    let config = TestConfig::default().to_arc();

    let missing = validate_token(State(config.clone()), HeaderMap::new()).await;
    assert_matches!(missing, Err(AppError::Auth(msg)) if msg == "Missing authorization header");

    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_static("Token abc"));
    let malformed = validate_token(State(config), headers).await;
    assert_matches!(
        malformed,
        Err(AppError::Auth(msg)) if msg == "Invalid authorization header format"
    );
}

#[tokio::test]
async fn verify_token_reports_expired_as_invalid() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::default();
    let token = JwtTestUtils::create_expired_token(&user, &config.supabase_jwt_secret);

    let response = verify_token(State(config), auth_headers(&token)).await.unwrap().0;
    assert_eq!(response, json!({ "valid": false }));
}

#[tokio::test]
async fn whoami_resolves_staff_profile() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::dentist("carla@clinica.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    mount_staff(
        &server,
        &user.id,
        json!([MockSupabaseResponses::staff_profile_response(10, &user.id, "dentista")]),
    )
    .await;

    let (status, body) = call(auth_routes(config), "/me", &token).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["kind"], "staff");
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["profile"]["role"], "dentista");
}

#[tokio::test]
async fn whoami_without_profile_is_forbidden() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::default();
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    mount_staff(&server, &user.id, json!([])).await;
    mount_patient(&server, &user.id, json!([])).await;

    let (status, _) = call(auth_routes(config), "/me", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_guard_admits_active_staff_only() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let dentist = TestUser::dentist("carla@clinica.test");
    let stranger = TestUser::patient("ana@example.com");

    mount_staff(
        &server,
        &dentist.id,
        json!([MockSupabaseResponses::staff_profile_response(10, &dentist.id, "dentista")]),
    )
    .await;
    mount_staff(&server, &stranger.id, json!([])).await;

    let dentist_token =
        JwtTestUtils::create_test_token(&dentist, &config.supabase_jwt_secret, Some(1));
    let (status, body) = call(guarded_app(config.clone()), "/staff", &dentist_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Dra. Carla Soto");

    let (status, _) = call(guarded_app(config.clone()), "/admin", &dentist_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stranger_token =
        JwtTestUtils::create_test_token(&stranger, &config.supabase_jwt_secret, Some(1));
    let (status, _) = call(guarded_app(config), "/staff", &stranger_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_guard_admits_administrative_staff() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let admin = TestUser::admin("pedro@clinica.test");

    mount_staff(
        &server,
        &admin.id,
        json!([MockSupabaseResponses::staff_profile_response(1, &admin.id, "administrativo")]),
    )
    .await;

    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(1));
    let (status, body) = call(guarded_app(config.clone()), "/admin", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, body) = call(guarded_app(config), "/staff", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Pedro Admin");
}

#[tokio::test]
async fn patient_guard_rejects_staff_and_inactive_accounts() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let admin = TestUser::admin("pedro@clinica.test");
    let inactive = TestUser::patient("old@example.com");
    let active = TestUser::patient("ana@example.com");

    mount_patient(&server, &admin.id, json!([])).await;
    mount_staff(
        &server,
        &admin.id,
        json!([MockSupabaseResponses::staff_profile_response(1, &admin.id, "administrativo")]),
    )
    .await;

    let mut inactive_row =
        MockSupabaseResponses::patient_account_response(7, &inactive.id, &inactive.email);
    inactive_row["active"] = json!(false);
    mount_patient(&server, &inactive.id, json!([inactive_row])).await;

    mount_patient(
        &server,
        &active.id,
        json!([MockSupabaseResponses::patient_account_response(8, &active.id, &active.email)]),
    )
    .await;

    let secret = config.supabase_jwt_secret.clone();

    let (status, body) = call(
        guarded_app(config.clone()),
        "/patient",
        &JwtTestUtils::create_test_token(&admin, &secret, Some(1)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("clients only"));

    let (status, _) = call(
        guarded_app(config.clone()),
        "/patient",
        &JwtTestUtils::create_test_token(&inactive, &secret, Some(1)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        guarded_app(config),
        "/patient",
        &JwtTestUtils::create_test_token(&active, &secret, Some(1)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ana@example.com");
}
