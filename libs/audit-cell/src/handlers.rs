use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{Actor, StaffPrincipal};
use shared_models::error::AppError;
use shared_utils::extractor::client_ip;

use crate::models::{AuditFilters, ClearAuditRequest, PurgeRequest};
use crate::services::reports::AuditReportService;
use crate::services::retention::AuditRetentionService;

#[axum::debug_handler]
pub async fn browse_audit_log(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filters): Query<AuditFilters>,
) -> Result<Json<Value>, AppError> {
    let browse = AuditReportService::new(&state)
        .browse(&filters, auth.token())
        .await?;

    Ok(Json(json!(browse)))
}

#[axum::debug_handler]
pub async fn audit_statistics(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let stats = AuditReportService::new(&state)
        .statistics(auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "estadisticas": stats
    })))
}

#[axum::debug_handler]
pub async fn clear_audit_log(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<ClearAuditRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = AuditRetentionService::new(&state)
        .clear_all(&request, &Actor::Staff(staff), client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": outcome.message,
        "total_antes": outcome.total_antes,
        "total_despues": outcome.total_despues,
        "eliminados": outcome.eliminados
    })))
}

#[axum::debug_handler]
pub async fn purge_audit_log(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<PurgeRequest>,
) -> Result<Json<Value>, AppError> {
    let report = AuditRetentionService::new(&state)
        .purge(&request, Utc::now(), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}
