use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{Actor, PatientPrincipal, StaffPrincipal};
use shared_models::error::AppError;
use shared_utils::extractor::client_ip;

use crate::models::{
    AppointmentError, AvailableFilters, CancelRequest, ConfirmQuery, CreateSlotRequest,
    PatientAppointmentsQuery, ReserveRequest, SlotsQuery, StaffListFilters,
};
use crate::services::{BookingService, ListingService};

#[axum::debug_handler]
pub async fn list_available(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filters): Query<AvailableFilters>,
) -> Result<Json<Value>, AppError> {
    let citas = ListingService::new(&state)
        .list_available(&filters, Utc::now(), auth.token())
        .await?;

    Ok(Json(json!({
        "total": citas.len(),
        "citas": citas
    })))
}

#[axum::debug_handler]
pub async fn slots_for_date(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let citas = ListingService::new(&state)
        .slots_for_date(query.fecha.as_deref(), auth.token())
        .await?;

    Ok(Json(json!({ "citas": citas })))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Query(query): Query<PatientAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let citas = ListingService::new(&state)
        .patient_appointments(&patient, query.incluir_completadas, auth.token())
        .await?;

    Ok(Json(json!({
        "total": citas.len(),
        "citas": citas
    })))
}

#[axum::debug_handler]
pub async fn appointment_history(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let citas = ListingService::new(&state)
        .history(&patient.email, auth.token())
        .await?;

    Ok(Json(json!({
        "email": patient.email,
        "total": citas.len(),
        "citas": citas
    })))
}

#[axum::debug_handler]
pub async fn reserve_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    headers: HeaderMap,
    Json(request): Json<ReserveRequest>,
) -> Result<Json<Value>, AppError> {
    let (cita, notificacion) = BookingService::new(&state)
        .reserve(request.cita_id, &patient, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Cita reservada correctamente",
        "cita": cita,
        "notificacion": notificacion
    })))
}

#[axum::debug_handler]
pub async fn cancel_my_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Path(appointment_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let (cita, notificacion) = BookingService::new(&state)
        .cancel(
            appointment_id,
            &Actor::Patient(patient),
            request.motivo,
            client_ip(&headers),
            auth.token(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Cita cancelada correctamente",
        "cita": cita,
        "notificacion": notificacion
    })))
}

/// Public endpoint behind the e-mail confirmation link.
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<i64>,
    Query(query): Query<ConfirmQuery>,
) -> Response {
    match BookingService::new(&state)
        .confirm(appointment_id, &query.token)
        .await
    {
        Ok(cita) => Json(json!({
            "ok": true,
            "cita_id": cita.id,
            "estado": cita.status
        }))
        .into_response(),
        Err(AppointmentError::NotReserved) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error": AppointmentError::NotReserved.to_string()
            })),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

#[axum::debug_handler]
pub async fn staff_list(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filters): Query<StaffListFilters>,
) -> Result<Json<Value>, AppError> {
    let page = ListingService::new(&state)
        .staff_list(&filters, auth.token())
        .await?;

    Ok(Json(json!({
        "citas": page.items,
        "page": page.page,
        "per_page": page.per_page,
        "total": page.total,
        "total_pages": page.total_pages,
        "has_next": page.has_next,
        "has_previous": page.has_previous
    })))
}

#[axum::debug_handler]
pub async fn staff_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let stats = ListingService::new(&state)
        .stats(Utc::now(), auth.token())
        .await?;

    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn staff_context(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
) -> Result<Json<Value>, AppError> {
    let context = ListingService::new(&state)
        .staff_context(&staff, auth.token())
        .await?;

    Ok(Json(json!(context)))
}

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let cita = BookingService::new(&state)
        .create_slot(&staff, &request, Utc::now(), client_ip(&headers), auth.token())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Cita disponible creada correctamente",
            "cita": cita
        })),
    ))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    Path(appointment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let cita = BookingService::new(&state)
        .complete(appointment_id, &staff, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Cita marcada como completada",
        "cita": cita
    })))
}

#[axum::debug_handler]
pub async fn staff_cancel(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    Path(appointment_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let (cita, notificacion) = BookingService::new(&state)
        .cancel(
            appointment_id,
            &Actor::Staff(staff),
            request.motivo,
            client_ip(&headers),
            auth.token(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Cita cancelada correctamente",
        "cita": cita,
        "notificacion": notificacion
    })))
}
