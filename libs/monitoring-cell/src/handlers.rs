use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use shared_config::AppConfig;

use crate::models::HealthReport;
use crate::services::HealthMonitorService;

#[axum::debug_handler]
pub async fn health_check(State(state): State<Arc<AppConfig>>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthMonitorService::new(&state).check().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
