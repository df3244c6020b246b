use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::PatientPrincipal;
use shared_models::error::AppError;
use shared_utils::extractor::client_ip;
use shared_utils::validation::validate_email;

use crate::models::{
    ClientListQuery, SubmitEvaluationRequest, UpdateProfileRequest, VerifyClientQuery,
};
use crate::services::{AccountService, ClientService, EvaluationService};

#[axum::debug_handler]
pub async fn verify_client(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<VerifyClientQuery>,
) -> Result<Json<Value>, AppError> {
    let email = validate_email(query.email.as_deref().unwrap_or_default())
        .map_err(AppError::BadRequest)?;

    let client = ClientService::new(&state)
        .verify_client(&email, auth.token())
        .await?;

    Ok(Json(match client {
        Some(client) => json!({
            "existe": true,
            "cliente": {
                "id": client.id,
                "nombre_completo": client.full_name,
                "email": client.email,
                "telefono": client.phone,
                "rut": client.rut,
                "dentista_asignado": client.assigned_dentist.map(|d| d.full_name),
            }
        }),
        None => json!({ "existe": false, "cliente": null }),
    }))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let account = AccountService::new(&state)
        .get_my_profile(&patient, auth.token())
        .await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    headers: HeaderMap,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let account = AccountService::new(&state)
        .update_my_profile(&patient, request, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Perfil actualizado correctamente",
        "perfil": account
    })))
}

#[axum::debug_handler]
pub async fn get_my_evaluation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
) -> Result<Json<Value>, AppError> {
    let evaluation = EvaluationService::new(&state)
        .get_mine(&patient, auth.token())
        .await?;

    Ok(Json(json!({
        "ya_evaluo": evaluation.is_some(),
        "evaluacion": evaluation
    })))
}

#[axum::debug_handler]
pub async fn submit_evaluation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(patient): Extension<PatientPrincipal>,
    headers: HeaderMap,
    Json(request): Json<SubmitEvaluationRequest>,
) -> Result<Json<Value>, AppError> {
    let evaluation = EvaluationService::new(&state)
        .submit(&patient, &request, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "¡Gracias por tu evaluación!",
        "evaluacion": evaluation
    })))
}

#[axum::debug_handler]
pub async fn list_clients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ClientListQuery>,
) -> Result<Json<Value>, AppError> {
    let clients = ClientService::new(&state)
        .list_clients(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "total": clients.len(),
        "clientes": clients
    })))
}

#[axum::debug_handler]
pub async fn get_client(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(client_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let client = ClientService::new(&state)
        .get_client(client_id, auth.token())
        .await?;

    Ok(Json(json!(client)))
}
