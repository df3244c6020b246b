use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{PatientPrincipal, StaffPrincipal};
use shared_models::error::AppError;
use shared_utils::extractor::client_ip;

use crate::models::{
    CreateConsentRequest, CreateOdontogramRequest, CreatePlanRequest, SignConsentRequest,
    UploadRadiographRequest,
};
use crate::services::{ConsentService, OdontogramService, RadiographService, TreatmentPlanService};

// ---------------------------------------------------------------------------
// Odontograms
// ---------------------------------------------------------------------------

#[axum::debug_handler]
pub async fn list_odontograms(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let service = OdontogramService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let odontogramas = service.list_for_patient(&scope, auth.token()).await?;

    Ok(Json(json!({
        "total": odontogramas.len(),
        "odontogramas": odontogramas
    })))
}

#[axum::debug_handler]
pub async fn get_odontogram(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Path(odontogram_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = OdontogramService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let odontograma = service
        .get_for_patient(odontogram_id, &scope, auth.token())
        .await?;

    Ok(Json(json!({ "odontograma": odontograma })))
}

#[axum::debug_handler]
pub async fn create_odontogram(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<CreateOdontogramRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let odontograma = OdontogramService::new(&state)
        .create_odontogram(&staff, &request, client_ip(&headers), auth.token())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "odontograma": odontograma
        })),
    ))
}

// ---------------------------------------------------------------------------
// Radiographs
// ---------------------------------------------------------------------------

#[axum::debug_handler]
pub async fn list_radiographs(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let service = RadiographService::new(&state);
    let scope = OdontogramService::new(&state)
        .scope_for(&patient, auth.token())
        .await?;
    let radiografias = service.list_for_patient(&scope, auth.token()).await?;

    Ok(Json(json!({
        "total": radiografias.len(),
        "radiografias": radiografias
    })))
}

pub async fn download_radiograph(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Path(radiograph_id): Path<i64>,
) -> Result<Response, AppError> {
    let scope = OdontogramService::new(&state)
        .scope_for(&patient, auth.token())
        .await?;
    let download = RadiographService::new(&state)
        .download(radiograph_id, &scope, auth.token())
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", download.filename);
    let disposition = HeaderValue::from_bytes(disposition.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid download filename: {}", e)))?;
    let content_type = HeaderValue::from_str(&download.object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        download.object.bytes,
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn upload_radiograph(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<UploadRadiographRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let radiografia = RadiographService::new(&state)
        .upload(&staff, &request, client_ip(&headers), auth.token())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "radiografia": radiografia
        })),
    ))
}

// ---------------------------------------------------------------------------
// Consents
// ---------------------------------------------------------------------------

#[axum::debug_handler]
pub async fn list_consents(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let service = ConsentService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let list = service.list_for_patient(&scope, auth.token()).await?;

    Ok(Json(json!(list)))
}

#[axum::debug_handler]
pub async fn get_consent(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Path(consent_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = ConsentService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let consentimiento = service.get(consent_id, &scope, auth.token()).await?;

    Ok(Json(json!({ "consentimiento": consentimiento })))
}

#[axum::debug_handler]
pub async fn sign_consent(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Path(consent_id): Path<i64>,
    headers: HeaderMap,
    Json(form): Json<SignConsentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ConsentService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let consentimiento = service
        .sign(consent_id, &patient, &scope, &form, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Consentimiento firmado exitosamente",
        "consentimiento": consentimiento
    })))
}

#[axum::debug_handler]
pub async fn create_consent(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<CreateConsentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let consentimiento = ConsentService::new(&state)
        .create_consent(&staff, &request, client_ip(&headers), auth.token())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "consentimiento": consentimiento
        })),
    ))
}

// ---------------------------------------------------------------------------
// Treatment plans
// ---------------------------------------------------------------------------

#[axum::debug_handler]
pub async fn pending_budgets(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentPlanService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let presupuestos = service.pending_budgets(&scope, auth.token()).await?;

    Ok(Json(json!({
        "total": presupuestos.len(),
        "presupuestos": presupuestos
    })))
}

#[axum::debug_handler]
pub async fn treatments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentPlanService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let tratamientos = service.treatments(&scope, auth.token()).await?;

    Ok(Json(json!({
        "total": tratamientos.len(),
        "tratamientos": tratamientos
    })))
}

#[axum::debug_handler]
pub async fn get_plan(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Path(plan_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentPlanService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let plan = service.get(plan_id, &scope, auth.token()).await?;

    Ok(Json(json!({
        "puede_aceptar": !plan.budget_accepted && !plan.is_closed(),
        "plan": plan
    })))
}

#[axum::debug_handler]
pub async fn accept_budget(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    Path(plan_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let service = TreatmentPlanService::new(&state);
    let scope = service.scope_for(&patient, auth.token()).await?;
    let plan = service
        .accept_budget(plan_id, &patient, &scope, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Presupuesto aceptado exitosamente. Acércate a la clínica o contáctanos \
                    para continuar con tu tratamiento.",
        "plan": plan
    })))
}

#[axum::debug_handler]
pub async fn create_plan(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let plan = TreatmentPlanService::new(&state)
        .create_plan(&staff, &request, client_ip(&headers), auth.token())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "plan": plan
        })),
    ))
}
