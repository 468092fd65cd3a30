use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CalendarError, CreateTimeBlockRequest, CreateWindowRequest};
use crate::services::calendar::CalendarService;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

fn map_calendar_error(e: CalendarError) -> AppError {
    match e {
        CalendarError::InvalidTimeRange(msg) => AppError::BadRequest(msg),
        CalendarError::WindowOverlap => AppError::Conflict(e.to_string()),
        CalendarError::NotFound => AppError::NotFound("Calendar entry not found".to_string()),
        CalendarError::Database(msg) => AppError::Internal(msg),
    }
}

/// Doctors manage their own calendar; admins manage any.
fn ensure_calendar_owner(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is_admin() || user.id == doctor_id.to_string() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not authorized to manage this doctor's calendar".to_string(),
        ))
    }
}

// ==============================================================================
// AVAILABLE SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let calendar_service = CalendarService::new(&state);

    let slots = calendar_service
        .available_slots(doctor_id, query.date, token)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "available_slots": slots,
        "total_slots": slots.len()
    })))
}

// ==============================================================================
// WORKING-HOUR WINDOWS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_window(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWindowRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    ensure_calendar_owner(&user, doctor_id)?;

    let calendar_service = CalendarService::new(&state);

    let window = calendar_service
        .create_window(doctor_id, request, token)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn list_windows(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let calendar_service = CalendarService::new(&state);

    let windows = calendar_service
        .list_windows(doctor_id, token)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "windows": windows
    })))
}

#[axum::debug_handler]
pub async fn delete_window(
    State(state): State<Arc<AppConfig>>,
    Path(window_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let calendar_service = CalendarService::new(&state);

    let window = calendar_service
        .get_window(window_id, token)
        .await
        .map_err(map_calendar_error)?;
    ensure_calendar_owner(&user, window.doctor_id)?;

    calendar_service
        .delete_window(window_id, token)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// TIME BLOCKS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_time_block(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTimeBlockRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    ensure_calendar_owner(&user, doctor_id)?;

    let calendar_service = CalendarService::new(&state);

    let block = calendar_service
        .create_time_block(doctor_id, request, token)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!(block)))
}

#[axum::debug_handler]
pub async fn list_time_blocks(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let calendar_service = CalendarService::new(&state);

    let blocks = calendar_service
        .list_time_blocks(doctor_id, token)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "time_blocks": blocks
    })))
}

#[axum::debug_handler]
pub async fn delete_time_block(
    State(state): State<Arc<AppConfig>>,
    Path(block_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let calendar_service = CalendarService::new(&state);

    let block = calendar_service
        .get_time_block(block_id, token)
        .await
        .map_err(map_calendar_error)?;
    ensure_calendar_owner(&user, block.doctor_id)?;

    calendar_service
        .delete_time_block(block_id, token)
        .await
        .map_err(map_calendar_error)?;

    Ok(Json(json!({ "success": true })))
}
