use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use auth_cell::guards::{require_patient, require_staff};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn records_routes(state: Arc<AppConfig>) -> Router {
    let patient_only = Router::new()
        .route("/odontograms", get(handlers::list_odontograms))
        .route("/odontograms/{id}", get(handlers::get_odontogram))
        .route("/radiographs", get(handlers::list_radiographs))
        .route("/radiographs/{id}/download", get(handlers::download_radiograph))
        .route("/consents", get(handlers::list_consents))
        .route("/consents/{id}", get(handlers::get_consent))
        .route("/consents/{id}/sign", post(handlers::sign_consent))
        .route("/budgets", get(handlers::pending_budgets))
        .route("/budgets/{id}", get(handlers::get_plan))
        .route("/budgets/{id}/accept", post(handlers::accept_budget))
        .route("/treatments", get(handlers::treatments))
        .layer(middleware::from_fn_with_state(state.clone(), require_patient));

    let staff_only = Router::new()
        .route("/staff/odontograms", post(handlers::create_odontogram))
        .route("/staff/radiographs", post(handlers::upload_radiograph))
        .route("/staff/consents", post(handlers::create_consent))
        .route("/staff/plans", post(handlers::create_plan))
        .layer(middleware::from_fn_with_state(state.clone(), require_staff));

    Router::new()
        .merge(patient_only)
        .merge(staff_only)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
