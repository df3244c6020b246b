use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{VerificationCodeRequest, VerifyCodeRequest};
use crate::services::verification::VerificationService;

#[axum::debug_handler]
pub async fn request_verification_code(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<VerificationCodeRequest>,
) -> Result<Json<Value>, AppError> {
    let (record, outcome) = VerificationService::new(&state)
        .issue(&request.email, Utc::now())
        .await?;

    Ok(Json(json!({
        "email": outcome,
        "expires_at": record.expires_at
    })))
}

#[axum::debug_handler]
pub async fn verify_code(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<Value>, AppError> {
    let valid = VerificationService::new(&state)
        .verify(&request.email, &request.code, Utc::now())
        .await?;

    if !valid {
        return Err(AppError::BadRequest(
            "Código inválido o expirado".to_string(),
        ));
    }

    Ok(Json(json!({ "valid": true })))
}
