use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use appointment_cell::appointment_routes;
use audit_cell::router::audit_routes;
use auth_cell::guards::require_patient;
use auth_cell::router::auth_routes;
use clinical_records_cell::records_routes;
use monitoring_cell::monitoring_routes;
use notification_cell::router::notification_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use staff_cell::router::staff_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dental clinic API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/staff", staff_routes(state.clone()))
        .nest("/records", records_routes(state.clone()))
        .nest("/audit", audit_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/health", monitoring_routes(state.clone()))
        .nest("/api", compat_routes(state))
}

/// Flat endpoints kept for the mobile client, backed by the same handlers.
fn compat_routes(state: Arc<AppConfig>) -> Router {
    let patient_only = Router::new()
        .route("/citas_disponibles", get(appointment_cell::handlers::list_available))
        .route("/reservar", post(appointment_cell::handlers::reserve_appointment))
        .route("/citas/historial", get(appointment_cell::handlers::appointment_history))
        .route(
            "/documentos/odontogramas",
            get(clinical_records_cell::handlers::list_odontograms),
        )
        .route(
            "/documentos/radiografias",
            get(clinical_records_cell::handlers::list_radiographs),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_patient));

    Router::new()
        .route("/clientes/verificar", get(patient_cell::handlers::verify_client))
        .merge(patient_only)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
