use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use auth_cell::guards::require_admin;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Audit log browsing and maintenance; administrative staff only.
pub fn audit_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::browse_audit_log))
        .route("/statistics", get(handlers::audit_statistics))
        .route("/clear", post(handlers::clear_audit_log))
        .route("/purge", post(handlers::purge_audit_log))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
