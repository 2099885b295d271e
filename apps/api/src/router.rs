use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, SchedulingContext};

pub fn create_router(context: Arc<SchedulingContext>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .route("/health", get(|| async { "ok" }))
        .nest("/appointments", appointment_routes(context))
}
