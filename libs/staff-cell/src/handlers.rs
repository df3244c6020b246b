use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::StaffPrincipal;
use shared_models::error::AppError;
use shared_utils::extractor::client_ip;

use crate::models::{AssignRoomRequest, RoomQuery, RoomRequest, UpdateStaffProfileRequest};
use crate::services::{RoomService, StaffService};

#[axum::debug_handler]
pub async fn list_dentists(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let dentists = StaffService::new(&state)
        .list_active_dentists(auth.token())
        .await?;

    Ok(Json(json!({
        "total": dentists.len(),
        "dentistas": dentists
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffService::new(&state)
        .get_my_profile(&staff, auth.token())
        .await?;

    Ok(Json(json!({
        "perfil": profile,
        "es_admin": staff.is_admin()
    })))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<UpdateStaffProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = StaffService::new(&state)
        .update_my_profile(&staff, request, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Perfil actualizado correctamente",
        "perfil": profile
    })))
}

#[axum::debug_handler]
pub async fn room_overview(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Value>, AppError> {
    let overview = RoomService::new(&state)
        .overview(&query, auth.token())
        .await?;

    Ok(Json(json!(overview)))
}

#[axum::debug_handler]
pub async fn create_room(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    headers: HeaderMap,
    Json(request): Json<RoomRequest>,
) -> Result<Json<Value>, AppError> {
    let room = RoomService::new(&state)
        .create_room(&staff, &request, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Sala \"{}\" creada exitosamente.", room.name),
        "sala": room
    })))
}

#[axum::debug_handler]
pub async fn update_room(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    Path(room_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<RoomRequest>,
) -> Result<Json<Value>, AppError> {
    let room = RoomService::new(&state)
        .update_room(&staff, room_id, &request, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Sala \"{}\" actualizada exitosamente.", room.name),
        "sala": room
    })))
}

#[axum::debug_handler]
pub async fn delete_room(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    Path(room_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let room = RoomService::new(&state)
        .delete_room(&staff, room_id, client_ip(&headers), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Sala \"{}\" eliminada exitosamente.", room.name)
    })))
}

#[axum::debug_handler]
pub async fn assign_room(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(staff): Extension<StaffPrincipal>,
    Path(dentist_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<AssignRoomRequest>,
) -> Result<Json<Value>, AppError> {
    let (dentist, room) = RoomService::new(&state)
        .assign_room(&staff, dentist_id, &request, client_ip(&headers), auth.token())
        .await?;

    let message = match &room {
        Some(room) => format!(
            "Sala \"{}\" asignada al dentista {} exitosamente.",
            room.name, dentist.full_name
        ),
        None => format!("Sala desasignada del dentista {} exitosamente.", dentist.full_name),
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "dentista": dentist,
        "sala": room
    })))
}
