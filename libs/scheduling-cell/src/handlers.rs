use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookAppointmentRequest, CreateObservationRequest, RescheduleRequest, SchedulingError,
};
use crate::services::engine::SchedulingEngine;
use crate::services::observation::ObservationService;

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::PatientBlocked => AppError::Forbidden(e.to_string()),
        SchedulingError::FutureAppointmentQuotaExceeded => AppError::Conflict(e.to_string()),
        SchedulingError::PastDateRequested => AppError::BadRequest(e.to_string()),
        SchedulingError::OutsideWorkingHours => AppError::BadRequest(e.to_string()),
        SchedulingError::SchedulingConflict => AppError::Conflict(e.to_string()),
        SchedulingError::InsufficientNotice => AppError::BadRequest(e.to_string()),
        SchedulingError::InvalidStatus(_) => AppError::Conflict(e.to_string()),
        SchedulingError::NotFound => AppError::NotFound(e.to_string()),
        SchedulingError::Forbidden => AppError::Forbidden(e.to_string()),
        SchedulingError::Transient => AppError::Internal(e.to_string()),
        SchedulingError::Database(msg) => AppError::Internal(msg),
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Patients book for themselves; admins may book on a patient's behalf.
    if !user.is_admin() && user.id != request.patient_id.to_string() {
        return Err(AppError::Forbidden(
            "Not authorized to book for this patient".to_string(),
        ));
    }

    let engine = SchedulingEngine::new(&state);

    let appointment = engine
        .book(&request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let engine = SchedulingEngine::new(&state);

    let appointment = engine
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let allowed = user.is_admin()
        || user.id == appointment.patient_id.to_string()
        || user.id == appointment.doctor_id.to_string();
    if !allowed {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && user.id != patient_id.to_string() {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's appointments".to_string(),
        ));
    }

    let engine = SchedulingEngine::new(&state);

    let appointments = engine
        .list_for_patient(patient_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && user.id != doctor_id.to_string() {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's appointments".to_string(),
        ));
    }

    let engine = SchedulingEngine::new(&state);

    let appointments = engine
        .list_for_doctor(doctor_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let engine = SchedulingEngine::new(&state);

    let appointment = engine
        .cancel(appointment_id, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let engine = SchedulingEngine::new(&state);

    let appointment = engine
        .reschedule(appointment_id, request.new_start_time, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn record_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let engine = SchedulingEngine::new(&state);

    let appointment = engine
        .record_no_show(appointment_id, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// OBSERVATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_observation(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateObservationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let observation_service = ObservationService::new(&state);

    let observation = observation_service
        .add_observation(appointment_id, &user, request.body, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(observation)))
}

#[axum::debug_handler]
pub async fn list_observations(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let observation_service = ObservationService::new(&state);

    let observations = observation_service
        .list_observations(appointment_id, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "observations": observations,
        "total": observations.len()
    })))
}
