use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;

/// Public sign-up helpers; no session exists yet when these are called.
pub fn notification_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/verification-code", post(handlers::request_verification_code))
        .route("/verification-code/verify", post(handlers::verify_code))
        .with_state(state)
}
