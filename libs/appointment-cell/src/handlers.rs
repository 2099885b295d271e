// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::context::SchedulingContext;
use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AvailabilityCheckRequest,
    AvailabilityCheckResponse, AvailableSlotsQuery, BookingOutcome, CancelAppointmentRequest,
    CreateBookingRequest, DoctorSchedule, DoctorScheduleQuery, RescheduleAppointmentRequest,
    StatusUpdateRequest, UpcomingAppointmentsQuery,
};
use crate::services::{
    AppointmentBookingService, AppointmentQueryService, AvailabilityChecker, SlotEnumerator,
};

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::DoctorNotFound | AppointmentError::NotFound => {
                AppError::NotFound(e.to_string())
            }
            AppointmentError::SlotUnavailable | AppointmentError::InvalidStatusTransition { .. } => {
                AppError::Conflict(e.to_string())
            }
            AppointmentError::Persistence(_) => AppError::Internal(e.public_reason()),
        }
    }
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(context): State<Arc<SchedulingContext>>,
    Json(request): Json<CreateBookingRequest>,
) -> (StatusCode, Json<BookingOutcome>) {
    let booking_service = AppointmentBookingService::new(context);
    let outcome = booking_service.create_booking(request).await;

    let status = match outcome.failure.clone() {
        None => StatusCode::CREATED,
        Some(failure) => AppError::from(failure).status_code(),
    };

    (status, Json(outcome))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(context): State<Arc<SchedulingContext>>,
    Json(request): Json<AvailabilityCheckRequest>,
) -> Result<Json<AvailabilityCheckResponse>, AppError> {
    let end_time = match request.end_time {
        Some(end_time) => end_time,
        None => {
            let doctor = context
                .directory()
                .get_doctor(request.doctor_id)
                .await
                .map_err(|e| {
                    error!("Doctor directory lookup for {} failed: {}", request.doctor_id, e);
                    AppointmentError::Persistence(e.to_string())
                })?
                .ok_or(AppointmentError::DoctorNotFound)?;
            request
                .start_time
                .checked_add_signed(doctor.default_duration)
                .ok_or_else(|| AppointmentError::Validation("Start time is out of range".to_string()))?
        }
    };

    let checker = AvailabilityChecker::new(context);
    let is_available = checker
        .check_availability(
            request.doctor_id,
            request.start_time,
            end_time,
            request.exclude_appointment_id,
        )
        .await?;

    Ok(Json(AvailabilityCheckResponse {
        doctor_id: request.doctor_id,
        start_time: request.start_time,
        end_time,
        is_available,
    }))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(context): State<Arc<SchedulingContext>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let enumerator = SlotEnumerator::new(context);
    let slots = enumerator
        .available_slots(doctor_id, query.date, query.duration_minutes)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots,
        "total": slots.len()
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(context): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let query_service = AppointmentQueryService::new(context);
    let appointment = query_service.get_appointment(appointment_id).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(context): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let booking_service = AppointmentBookingService::new(context);
    let appointment = booking_service
        .reschedule_appointment(appointment_id, request.new_start_time)
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(context): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Appointment>, AppError> {
    let status: AppointmentStatus = request.status.parse()?;

    let booking_service = AppointmentBookingService::new(context);
    let appointment = booking_service
        .transition_status(appointment_id, status, request.notes)
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(context): State<Arc<SchedulingContext>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let booking_service = AppointmentBookingService::new(context);
    let appointment = booking_service
        .cancel_appointment(appointment_id, request.reason)
        .await?;
    Ok(Json(appointment))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(context): State<Arc<SchedulingContext>>,
    Query(query): Query<UpcomingAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let query_service = AppointmentQueryService::new(context);
    let appointments = query_service.upcoming(query.days_ahead).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(context): State<Arc<SchedulingContext>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorScheduleQuery>,
) -> Result<Json<DoctorSchedule>, AppError> {
    let query_service = AppointmentQueryService::new(context);
    let schedule = query_service
        .doctor_schedule(doctor_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(schedule))
}
