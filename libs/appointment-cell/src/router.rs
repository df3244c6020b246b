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

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let patient_only = Router::new()
        .route("/available", get(handlers::list_available))
        .route("/slots", get(handlers::slots_for_date))
        .route("/mine", get(handlers::my_appointments))
        .route("/history", get(handlers::appointment_history))
        .route("/reserve", post(handlers::reserve_appointment))
        .route("/{id}/cancel", post(handlers::cancel_my_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), require_patient));

    let staff_only = Router::new()
        .route("/desk", get(handlers::staff_list))
        .route("/desk/stats", get(handlers::staff_stats))
        .route("/desk/context", get(handlers::staff_context))
        .route("/desk/slots", post(handlers::create_slot))
        .route("/desk/{id}/complete", post(handlers::complete_appointment))
        .route("/desk/{id}/cancel", post(handlers::staff_cancel))
        .layer(middleware::from_fn_with_state(state.clone(), require_staff));

    // Reached from e-mail links, so it sits outside the JWT layer.
    let public = Router::new().route("/{id}/confirm", get(handlers::confirm_appointment));

    Router::new()
        .merge(patient_only)
        .merge(staff_only)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .merge(public)
        .with_state(state)
}
