// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::context::SchedulingContext;
use crate::handlers;

pub fn appointment_routes(context: Arc<SchedulingContext>) -> Router {
    Router::new()
        // Booking
        .route("/", post(handlers::create_booking))
        .route("/check-availability", post(handlers::check_availability))
        .route("/available-slots/{doctor_id}", get(handlers::get_available_slots))

        // Listings
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/doctors/{doctor_id}/schedule", get(handlers::get_doctor_schedule))

        // Single appointment
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/status", post(handlers::update_appointment_status))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))

        .with_state(context)
}
