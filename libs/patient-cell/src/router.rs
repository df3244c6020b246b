use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use auth_cell::guards::{require_patient, require_staff};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    let self_service = Router::new()
        .route("/me", get(handlers::get_my_profile).put(handlers::update_my_profile))
        .route(
            "/me/evaluation",
            get(handlers::get_my_evaluation).post(handlers::submit_evaluation),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_patient));

    let staff_only = Router::new()
        .route("/clients", get(handlers::list_clients))
        .route("/clients/{id}", get(handlers::get_client))
        .layer(middleware::from_fn_with_state(state.clone(), require_staff));

    Router::new()
        .route("/verify", get(handlers::verify_client))
        .merge(self_service)
        .merge(staff_only)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
