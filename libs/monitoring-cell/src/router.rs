use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::AppConfig;

use crate::handlers;

/// Public health routes; no authentication.
pub fn monitoring_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .with_state(state)
}
