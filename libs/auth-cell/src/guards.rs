//! Router layers that turn an authenticated JWT user into a staff or patient principal.
//!
//! They must run inside `auth_middleware`, which places the `User` in the request
//! extensions first.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use shared_config::AppConfig;
use shared_models::auth::{StaffPrincipal, User};
use shared_models::error::AppError;
use shared_utils::extractor::{bearer_token, extract_user};

use crate::services::principal::PrincipalService;

/// Takes owned request data so no borrow of the (non-`Sync`) body is held across `.await`.
async fn load_staff(
    config: &AppConfig,
    user: User,
    token: String,
) -> Result<StaffPrincipal, AppError> {
    let staff = PrincipalService::new(config)
        .find_staff(&user.id, &token)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user.id, "non-staff user attempted a staff route");
            AppError::Forbidden("Staff access required".to_string())
        })?;

    if !staff.active {
        return Err(AppError::Forbidden("Staff profile is inactive".to_string()));
    }

    Ok(staff)
}

pub async fn require_staff(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    let token = bearer_token(request.headers())?;
    let staff = load_staff(&config, user, token).await?;
    request.extensions_mut().insert(staff);
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    let token = bearer_token(request.headers())?;
    let staff = load_staff(&config, user, token).await?;
    if !staff.is_admin() {
        warn!(staff_id = staff.id, "non-admin staff attempted an admin route");
        return Err(AppError::Forbidden(
            "Only administrative staff can perform this action".to_string(),
        ));
    }
    request.extensions_mut().insert(staff);
    Ok(next.run(request).await)
}

/// Admits only active patient accounts; staff members are turned away.
pub async fn require_patient(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    let token = bearer_token(request.headers())?;
    let principals = PrincipalService::new(&config);

    let patient = match principals.find_patient(&user.id, &token).await? {
        Some(patient) => patient,
        None => {
            if principals.find_staff(&user.id, &token).await?.is_some() {
                return Err(AppError::Forbidden(
                    "This section is for clients only".to_string(),
                ));
            }
            return Err(AppError::Forbidden("Patient account required".to_string()));
        }
    };

    if !patient.active {
        return Err(AppError::Forbidden(
            "Your account is inactive. Contact the clinic for more information".to_string(),
        ));
    }

    request.extensions_mut().insert(patient);
    Ok(next.run(request).await)
}
