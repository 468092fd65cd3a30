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

use crate::models::StandingError;
use crate::services::standing::StandingService;

fn map_standing_error(e: StandingError) -> AppError {
    match e {
        StandingError::NotBlocked => AppError::BadRequest(e.to_string()),
        StandingError::Database(msg) => AppError::Internal(msg),
    }
}

/// Patients may view their own standing; staff may view anyone's.
#[axum::debug_handler]
pub async fn get_standing(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if user.is_patient() && user.id != patient_id.to_string() {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's standing".to_string(),
        ));
    }

    let standing_service = StandingService::new(&state);

    let standing = standing_service
        .get_standing(patient_id, token)
        .await
        .map_err(map_standing_error)?;

    Ok(Json(json!(standing)))
}

/// Administrative unblock. Admin only.
#[axum::debug_handler]
pub async fn unblock_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can unblock patients".to_string(),
        ));
    }

    let standing_service = StandingService::new(&state);

    let standing = standing_service
        .unblock(patient_id, token)
        .await
        .map_err(map_standing_error)?;

    Ok(Json(json!(standing)))
}
