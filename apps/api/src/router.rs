use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use calendar_cell::router::calendar_routes;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;
use standing_cell::router::standing_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduler API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/calendar", calendar_routes(state.clone()))
        .nest("/standing", standing_routes(state.clone()))
}
