// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::DoctorScheduleView;
use shared_models::TimeWindow;

use crate::context::SchedulingContext;
use crate::models::{AppointmentError, AppointmentStatus};
use crate::services::locking::DoctorLocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    DoctorNotFound,
    DoctorInactive,
    DayClosed,
    OutsideWorkingHours,
    DuringBreak,
    /// Collides with this active appointment.
    Overlaps(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(UnavailableReason),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

pub struct AvailabilityChecker {
    context: Arc<SchedulingContext>,
}

impl AvailabilityChecker {
    pub fn new(context: Arc<SchedulingContext>) -> Self {
        Self { context }
    }

    /// Public availability probe. Takes the doctor lock so the answer is
    /// consistent with concurrent bookings; anything indeterminate (lock
    /// timeout, backend failure) is reported as busy.
    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let window = TimeWindow::new(start, end).ok_or_else(|| {
            AppointmentError::Validation("End time must be after start time".to_string())
        })?;

        let locks = DoctorLocks::new(Arc::clone(self.context.locks()), *self.context.settings());
        let Ok(token) = locks.acquire(doctor_id).await else {
            return Ok(false);
        };

        let result = self.evaluate(doctor_id, window, exclude_appointment_id).await;
        locks.release(token).await;

        match result {
            Ok(availability) => Ok(availability.is_available()),
            Err(e) => {
                warn!("Availability check for doctor {} failed, treating as busy: {}", doctor_id, e);
                Ok(false)
            }
        }
    }

    /// Runs every check without locking. Callers that act on the answer must
    /// hold the doctor's lock.
    pub async fn evaluate(
        &self,
        doctor_id: Uuid,
        window: TimeWindow,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Availability, AppointmentError> {
        let doctor = self.context
            .directory()
            .get_doctor(doctor_id)
            .await
            .map_err(|e| AppointmentError::Persistence(e.to_string()))?;

        let Some(doctor) = doctor else {
            debug!("Doctor {} not found", doctor_id);
            return Ok(Availability::Unavailable(UnavailableReason::DoctorNotFound));
        };

        self.evaluate_for(&doctor, window, exclude_appointment_id).await
    }

    /// Same checks against an already-resolved doctor.
    pub async fn evaluate_for(
        &self,
        doctor: &DoctorScheduleView,
        window: TimeWindow,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Availability, AppointmentError> {
        if let Some(reason) = self.schedule_rejection(doctor, window) {
            debug!("Doctor {} unavailable at {}: {:?}", doctor.doctor_id, window.start, reason);
            return Ok(Availability::Unavailable(reason));
        }

        let conflicts = self.context
            .store()
            .find_overlapping(doctor.doctor_id, window, &AppointmentStatus::ACTIVE)
            .await
            .map_err(|e| AppointmentError::Persistence(e.to_string()))?;

        let blocking = conflicts
            .iter()
            .find(|a| Some(a.id) != exclude_appointment_id && a.window().overlaps(&window));

        match blocking {
            Some(existing) => {
                debug!(
                    "Doctor {} already booked {} - {} (appointment {})",
                    doctor.doctor_id, existing.scheduled_start, existing.scheduled_end, existing.id
                );
                Ok(Availability::Unavailable(UnavailableReason::Overlaps(existing.id)))
            }
            None => Ok(Availability::Available),
        }
    }

    /// Working-hours checks, in order: active, day open, inside hours, clear of break.
    fn schedule_rejection(
        &self,
        doctor: &DoctorScheduleView,
        window: TimeWindow,
    ) -> Option<UnavailableReason> {
        if !doctor.is_active {
            return Some(UnavailableReason::DoctorInactive);
        }

        let offset = self.context.settings().clinic_offset;
        let local_date = window.start.with_timezone(&offset).date_naive();

        let Some(day) = doctor.schedule.for_weekday(local_date.weekday()) else {
            return Some(UnavailableReason::DayClosed);
        };
        let Some(working) = day.window_on(local_date, offset) else {
            return Some(UnavailableReason::DayClosed);
        };

        if !working.contains(&window) {
            return Some(UnavailableReason::OutsideWorkingHours);
        }

        match day.break_on(local_date, offset) {
            Some(lunch) if lunch.overlaps(&window) => Some(UnavailableReason::DuringBreak),
            _ => None,
        }
    }
}
