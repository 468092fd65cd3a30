use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn calendar_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/doctors/{doctor_id}/slots", get(handlers::get_available_slots))
        .route("/doctors/{doctor_id}/windows", post(handlers::create_window))
        .route("/doctors/{doctor_id}/windows", get(handlers::list_windows))
        .route("/windows/{window_id}", delete(handlers::delete_window))
        .route("/doctors/{doctor_id}/blocks", post(handlers::create_time_block))
        .route("/doctors/{doctor_id}/blocks", get(handlers::list_time_blocks))
        .route("/blocks/{block_id}", delete(handlers::delete_time_block))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
