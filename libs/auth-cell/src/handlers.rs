use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{Actor, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt;

use crate::services::principal::PrincipalService;

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(&headers)?;
    let user = jwt::validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token(&headers)?;
    let valid = jwt::validate_token(&token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

/// Tells the caller which population they belong to and returns their profile.
#[axum::debug_handler]
pub async fn whoami(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&headers)?;
    let actor = PrincipalService::new(&config)
        .resolve_actor(&user.id, &token)
        .await?;

    let body = match actor {
        Actor::Staff(staff) => json!({
            "kind": "staff",
            "is_admin": staff.is_admin(),
            "profile": staff,
        }),
        Actor::Patient(patient) => json!({
            "kind": "patient",
            "active": patient.active,
            "profile": patient,
        }),
        Actor::Anonymous => {
            return Err(AppError::Forbidden(
                "No staff profile or patient account is linked to this user".to_string(),
            ))
        }
    };

    Ok(Json(body))
}
