use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use auth_cell::guards::{require_admin, require_staff};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn staff_routes(state: Arc<AppConfig>) -> Router {
    let staff_only = Router::new()
        .route("/dentists", get(handlers::list_dentists))
        .route("/me", get(handlers::get_my_profile).put(handlers::update_my_profile))
        .layer(middleware::from_fn_with_state(state.clone(), require_staff));

    let admin_only = Router::new()
        .route("/rooms", get(handlers::room_overview).post(handlers::create_room))
        .route("/rooms/{id}", put(handlers::update_room).delete(handlers::delete_room))
        .route("/dentists/{id}/room", post(handlers::assign_room))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(staff_only)
        .merge(admin_only)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
