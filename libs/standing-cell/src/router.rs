use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn standing_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{patient_id}", get(handlers::get_standing))
        .route("/{patient_id}/unblock", post(handlers::unblock_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
