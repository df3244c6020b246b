use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::appointment_routes;
use appointment_cell::services::token::confirmation_token;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

const EMAIL: &str = "ana@correo.cl";

struct Harness {
    server: MockServer,
    config: Arc<AppConfig>,
    user: TestUser,
    token: String,
}

async fn harness(user: TestUser) -> Harness {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));
    Harness { server, config, user, token }
}

async fn patient_harness() -> Harness {
    let h = harness(TestUser::patient(EMAIL)).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/client_accounts"))
        .and(query_param("user_id", format!("eq.{}", h.user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_account_response(7, &h.user.id, EMAIL)
        ])))
        .mount(&h.server)
        .await;
    h
}

async fn staff_harness() -> Harness {
    let h = harness(TestUser::admin("pedro@clinica.test")).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("user_id", format!("eq.{}", h.user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::staff_profile_response(1, &h.user.id, "administrativo")
        ])))
        .mount(&h.server)
        .await;
    h
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

    let app = Router::new().nest("/appointments", appointment_routes(h.config.clone()));
    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn mount_active_count(h: &Harness, total: u64) {
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-range", format!("*/{}", total)),
        )
        .mount(&h.server)
        .await;
}

async fn mount_client(h: &Harness) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::client_response(3, EMAIL)
        ])))
        .mount(&h.server)
        .await;
}

async fn mount_appointment(h: &Harness, row: Value) {
    let id = row["id"].as_i64().unwrap();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&h.server)
        .await;
}

fn slot(id: i64, status: &str) -> Value {
    MockSupabaseResponses::appointment_response(id, status, "2030-01-15T13:30:00Z")
}

#[tokio::test]
async fn reserving_a_slot_books_it_for_the_patient() {
    let h = patient_harness().await;
    mount_active_count(&h, 0).await;
    mount_client(&h).await;
    mount_appointment(&h, slot(5, "disponible")).await;

    let mut reserved = slot(5, "reservada");
    reserved["client_id"] = json!(3);
    reserved["patient_name"] = json!("Ana Pérez");
    reserved["patient_email"] = json!(EMAIL);
    reserved["notes"] = json!("username: ana");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.5"))
        .and(query_param("status", "eq.disponible"))
        .and(body_partial_json(json!({
            "status": "reservada",
            "client_id": 3,
            "patient_email": EMAIL,
            "notes": "username: ana"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([reserved])))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/reserve",
        Some(json!({ "cita_id": 5 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["cita"]["status"], json!("reservada"));
    assert_eq!(body["notificacion"]["enviado"], json!(true));
}

#[tokio::test]
async fn patients_hold_one_active_appointment_at_a_time() {
    let h = patient_harness().await;
    mount_active_count(&h, 1).await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/reserve",
        Some(json!({ "cita_id": 5 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().starts_with("Ya tienes una cita activa"));
}

#[tokio::test]
async fn losing_the_reservation_race_reports_slot_taken() {
    let h = patient_harness().await;
    mount_active_count(&h, 0).await;
    mount_client(&h).await;
    mount_appointment(&h, slot(5, "disponible")).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.server)
        .await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/reserve",
        Some(json!({ "cita_id": 5 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("Esta cita ya no está disponible"));
}

#[tokio::test]
async fn reserved_slots_cannot_be_reserved_again() {
    let h = patient_harness().await;
    mount_active_count(&h, 0).await;
    mount_client(&h).await;
    mount_appointment(&h, slot(5, "reservada")).await;

    let (status, _) = send(
        &h,
        "POST",
        "/appointments/reserve",
        Some(json!({ "cita_id": 5 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn confirmation_link_confirms_reserved_appointment() {
    let h = harness(TestUser::patient(EMAIL)).await;
    mount_appointment(&h, slot(5, "reservada")).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.reservada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot(5, "confirmada")])))
        .expect(1)
        .mount(&h.server)
        .await;

    let token = confirmation_token(5, &h.config.supabase_jwt_secret).unwrap();
    let (status, body) = send(
        &h,
        "GET",
        &format!("/appointments/5/confirm?token={}", token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "cita_id": 5, "estado": "confirmada" }));
}

#[tokio::test]
async fn confirming_an_unreserved_slot_is_rejected() {
    let h = harness(TestUser::patient(EMAIL)).await;
    mount_appointment(&h, slot(5, "disponible")).await;

    let token = confirmation_token(5, &h.config.supabase_jwt_secret).unwrap();
    let (status, body) = send(
        &h,
        "GET",
        &format!("/appointments/5/confirm?token={}", token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false, "error": "Cita no reservada" }));
}

#[tokio::test]
async fn confirmation_with_forged_token_is_forbidden() {
    let h = harness(TestUser::patient(EMAIL)).await;
    let forged = confirmation_token(6, &h.config.supabase_jwt_secret).unwrap();

    let (status, _) = send(
        &h,
        "GET",
        &format!("/appointments/5/confirm?token={}", forged),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patients_cannot_cancel_someone_elses_appointment() {
    let h = patient_harness().await;
    mount_client(&h).await;

    let mut other = slot(9, "reservada");
    other["client_id"] = json!(99);
    other["patient_email"] = json!("otro@correo.cl");
    mount_appointment(&h, other).await;

    let (status, _) = send(&h, "POST", "/appointments/9/cancel", Some(json!({}))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn slots_for_a_malformed_date_report_the_format() {
    let h = patient_harness().await;

    let (status, body) = send(&h, "GET", "/appointments/slots?fecha=15-01-2030", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Formato de fecha inválido"));
}

#[tokio::test]
async fn slots_for_a_date_use_clinic_local_time() {
    let h = patient_harness().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.disponible"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot(5, "disponible")])))
        .mount(&h.server)
        .await;

    let (status, body) = send(&h, "GET", "/appointments/slots?fecha=2030-01-15", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["citas"],
        json!([{ "id": 5, "fecha_hora": "15/01/2030 10:30", "hora": "10:30" }])
    );
}

#[tokio::test]
async fn slots_in_the_past_are_rejected() {
    let h = staff_harness().await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/desk/slots",
        Some(json!({
            "fecha_hora": "2001-01-01T12:00:00Z",
            "dentista_id": 10,
            "tipo_servicio_id": 3
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("futuras"));
}

#[tokio::test]
async fn dentists_cannot_double_book_an_instant() {
    let h = staff_harness().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("id", "eq.10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::staff_profile_response(10, "dentist-user", "dentista")
        ])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/service_types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 3, "name": "Limpieza dental" }
        ])))
        .mount(&h.server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("starts_at", "eq.2030-01-15T13:30:00Z"))
        .and(query_param("status", "neq.cancelada"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/1"))
        .mount(&h.server)
        .await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/desk/slots",
        Some(json!({
            "fecha_hora": "2030-01-15T13:30:00Z",
            "dentista_id": 10,
            "tipo_servicio_id": 3
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("El dentista ya tiene una cita a esa hora"));
}

#[tokio::test]
async fn staff_listing_clamps_page_and_flags_records() {
    let h = staff_harness().await;

    let rows: Vec<Value> = (1..=8).map(|id| slot(id, "reservada")).collect();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(rows)))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/odontograms"))
        .and(query_param("appointment_id", "in.(7,8)"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": 40, "appointment_id": 7 }])),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = send(&h, "GET", "/appointments/desk?page=99&buscar=CARLA", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], json!(2));
    assert_eq!(body["total"], json!(8));
    let citas = body["citas"].as_array().unwrap();
    assert_eq!(citas.len(), 2);
    assert_eq!(citas[0]["id"], json!(7));
    assert_eq!(citas[0]["has_record"], json!(true));
    assert_eq!(citas[0]["odontogram_id"], json!(40));
    assert_eq!(citas[1]["has_record"], json!(false));
}

#[tokio::test]
async fn staff_routes_turn_patients_away() {
    let h = patient_harness().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.server)
        .await;

    let (status, _) = send(&h, "GET", "/appointments/desk/stats", None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn booked(id: i64, status: &str) -> Value {
    let mut row = slot(id, status);
    row["client_id"] = json!(3);
    row["patient_name"] = json!("Ana Pérez");
    row["patient_email"] = json!(EMAIL);
    row
}

async fn mount_cas_update(h: &Harness, id: i64, expected: &str, updated: Value) {
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", format!("eq.{}", expected)))
        .and(body_partial_json(json!({ "status": updated["status"].clone() })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&h.server)
        .await;
}

#[tokio::test]
async fn staff_complete_a_reserved_appointment() {
    let h = staff_harness().await;
    mount_appointment(&h, booked(5, "reservada")).await;
    mount_cas_update(&h, 5, "reservada", booked(5, "completada")).await;

    let (status, body) = send(&h, "POST", "/appointments/desk/5/complete", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["cita"]["status"], json!("completada"));
}

#[tokio::test]
async fn completing_an_available_slot_is_rejected() {
    let h = staff_harness().await;
    mount_appointment(&h, slot(5, "disponible")).await;

    let (status, _) = send(&h, "POST", "/appointments/desk/5/complete", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn withdrawing_an_available_slot_sends_no_email() {
    let h = staff_harness().await;
    mount_appointment(&h, slot(5, "disponible")).await;
    mount_cas_update(&h, 5, "disponible", slot(5, "cancelada")).await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/desk/5/cancel",
        Some(json!({ "motivo": "Agenda cerrada" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cita"]["status"], json!("cancelada"));
    assert_eq!(body["notificacion"], Value::Null);
}

#[tokio::test]
async fn staff_cancelling_a_booking_notifies_the_patient() {
    let h = staff_harness().await;
    mount_appointment(&h, booked(5, "reservada")).await;
    mount_cas_update(&h, 5, "reservada", booked(5, "cancelada")).await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/desk/5/cancel",
        Some(json!({ "motivo": "Dentista con licencia" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cita"]["status"], json!("cancelada"));
    assert_eq!(body["notificacion"]["enviado"], json!(true));
}

#[tokio::test]
async fn patients_cancel_their_own_confirmed_appointment() {
    let h = patient_harness().await;
    mount_appointment(&h, booked(5, "confirmada")).await;
    mount_cas_update(&h, 5, "confirmada", booked(5, "cancelada")).await;

    let (status, body) = send(&h, "POST", "/appointments/5/cancel", Some(json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["cita"]["status"], json!("cancelada"));
    assert_eq!(body["notificacion"]["enviado"], json!(true));
}

#[tokio::test]
async fn patients_cannot_cancel_a_completed_appointment() {
    let h = patient_harness().await;
    mount_appointment(&h, booked(5, "completada")).await;

    let (status, _) = send(&h, "POST", "/appointments/5/cancel", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn staff_create_an_available_slot() {
    let h = staff_harness().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("id", "eq.10"))
        .and(query_param("role", "eq.dentista"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::staff_profile_response(10, "dentist-user", "dentista")
        ])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/service_types"))
        .and(query_param("id", "eq.3"))
        .and(query_param("active", "is.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 3, "name": "Limpieza dental" }
        ])))
        .mount(&h.server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("dentist_id", "eq.10"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "starts_at": "2030-01-15T13:30:00Z",
            "status": "disponible",
            "dentist_id": 10,
            "service_type_id": 3,
            "consultation_type": "Limpieza dental"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([slot(12, "disponible")])))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = send(
        &h,
        "POST",
        "/appointments/desk/slots",
        Some(json!({
            "fecha_hora": "2030-01-15T13:30:00Z",
            "dentista_id": 10,
            "tipo_servicio_id": 3
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], json!("Cita disponible creada correctamente"));
    assert_eq!(body["cita"]["id"], json!(12));
}

#[tokio::test]
async fn available_listing_filters_by_service_id_and_ignores_bad_dentist() {
    let h = patient_harness().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.disponible"))
        .and(query_param("service_type_id", "eq.3"))
        .and(query_param_is_missing("dentist_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot(5, "disponible")])))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = send(
        &h,
        "GET",
        "/appointments/available?tipo_consulta=3&dentista_id=abc",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["citas"][0]["servicio_info"]["precio_formateado"], json!("$25,000"));
    assert_eq!(body["citas"][0]["fecha_hora_local"], json!("15/01/2030 10:30"));
}

#[tokio::test]
async fn available_listing_matches_free_text_consultation_type() {
    let h = patient_harness().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("consultation_type", "eq.Limpieza dental"))
        .and(query_param("dentist_id", "eq.10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = send(
        &h,
        "GET",
        "/appointments/available?tipo_consulta=Limpieza%20dental&dentista_id=10",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "total": 0, "citas": [] }));
}

#[tokio::test]
async fn desk_stats_count_today_available_and_completed() {
    let h = staff_harness().await;

    let counts = [("neq.cancelada", 2), ("eq.disponible", 5), ("eq.completada", 9)];
    for (status_filter, total) in counts {
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("status", status_filter))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-range", format!("*/{}", total)),
            )
            .expect(1)
            .mount(&h.server)
            .await;
    }

    let (status, body) = send(&h, "GET", "/appointments/desk/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "citas_hoy": 2, "disponibles": 5, "realizadas": 9 }));
}

#[tokio::test]
async fn history_requires_an_active_client_record() {
    let h = patient_harness().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("email", format!("eq.{}", EMAIL)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.server)
        .await;

    let (status, body) = send(&h, "GET", "/appointments/history", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Cliente no encontrado"));
}
