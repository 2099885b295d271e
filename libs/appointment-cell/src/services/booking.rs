// libs/appointment-cell/src/services/booking.rs
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::DoctorScheduleView;
use notification_queue_cell::AppointmentEvent;
use shared_models::TimeWindow;

use crate::context::SchedulingContext;
use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookingOutcome, CreateBookingRequest,
};
use crate::services::availability::{Availability, AvailabilityChecker};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::locking::DoctorLocks;
use crate::services::store::StoreError;

/// Every write to an appointment goes through here, under the doctor's lock.
pub struct AppointmentBookingService {
    context: Arc<SchedulingContext>,
    availability: AvailabilityChecker,
    locks: DoctorLocks,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(context: Arc<SchedulingContext>) -> Self {
        Self {
            availability: AvailabilityChecker::new(Arc::clone(&context)),
            locks: DoctorLocks::new(Arc::clone(context.locks()), *context.settings()),
            lifecycle: AppointmentLifecycleService::new(),
            context,
        }
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Lock, re-check, persist, then hand the new id to the notifier.
    /// Expected failures come back inside the outcome, never as a panic or `Err`.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, patient_id = %request.patient_id))]
    pub async fn create_booking(&self, request: CreateBookingRequest) -> BookingOutcome {
        match self.book(request).await {
            Ok(appointment) => {
                info!(
                    "Booked appointment {} from {} to {}",
                    appointment.id, appointment.scheduled_start, appointment.scheduled_end
                );
                self.notify(AppointmentEvent::created(appointment.id));
                BookingOutcome::booked(appointment)
            }
            Err(e) => {
                match &e {
                    AppointmentError::Persistence(_) => error!("Booking failed: {}", e),
                    _ => warn!("Booking rejected: {}", e),
                }
                BookingOutcome::rejected(e)
            }
        }
    }

    async fn book(&self, request: CreateBookingRequest) -> Result<Appointment, AppointmentError> {
        if request.start_time < Utc::now() {
            return Err(AppointmentError::Validation(
                "Appointment time must be in the future".to_string(),
            ));
        }

        let doctor = self.resolve_doctor(request.doctor_id).await?;
        let window = TimeWindow::starting_at(request.start_time, doctor.default_duration)
            .ok_or_else(|| AppointmentError::Validation("Doctor has no usable appointment duration".to_string()))?;

        let token = self.locks.acquire(doctor.doctor_id).await?;
        let result = self.within_deadline(self.commit_booking(&doctor, window, request)).await;
        self.locks.release(token).await;

        result
    }

    async fn commit_booking(
        &self,
        doctor: &DoctorScheduleView,
        window: TimeWindow,
        request: CreateBookingRequest,
    ) -> Result<Appointment, AppointmentError> {
        let availability = self.availability.evaluate_for(doctor, window, None).await?;
        if let Availability::Unavailable(reason) = availability {
            debug!("Slot {} - {} unavailable: {:?}", window.start, window.end, reason);
            return Err(AppointmentError::SlotUnavailable);
        }

        let appointment = Appointment::scheduled(
            request.patient_id,
            doctor.doctor_id,
            window,
            request.appointment_type,
            request.reason,
            request.notes,
        );

        self.context
            .store()
            .insert(&appointment)
            .await
            .map_err(|e| store_failure(e, appointment.id))
    }

    async fn resolve_doctor(&self, doctor_id: Uuid) -> Result<DoctorScheduleView, AppointmentError> {
        self.context
            .directory()
            .get_doctor(doctor_id)
            .await
            .map_err(|e| {
                error!("Doctor directory lookup for {} failed: {}", doctor_id, e);
                AppointmentError::Persistence(e.to_string())
            })?
            .ok_or(AppointmentError::DoctorNotFound)
    }

    // ==========================================================================
    // RESCHEDULE
    // ==========================================================================

    /// Moves an active appointment to `new_start`, keeping its duration.
    #[instrument(skip(self))]
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        if new_start < Utc::now() {
            return Err(AppointmentError::Validation(
                "Appointment time must be in the future".to_string(),
            ));
        }

        let existing = self.load(appointment_id).await?;
        let token = self.locks.acquire(existing.doctor_id).await?;
        let result = self.within_deadline(self.commit_reschedule(appointment_id, new_start)).await;
        self.locks.release(token).await;

        let appointment = result?;
        info!("Rescheduled appointment {} to {}", appointment.id, appointment.scheduled_start);
        Ok(appointment)
    }

    async fn commit_reschedule(
        &self,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        // Re-read under the lock, the row may have moved on since
        let mut appointment = self.load(appointment_id).await?;

        if !appointment.status.is_active() {
            return Err(AppointmentError::Validation(format!(
                "Only scheduled or confirmed appointments can be rescheduled, this one is {}",
                appointment.status
            )));
        }

        let window = TimeWindow::starting_at(new_start, appointment.window().duration())
            .ok_or_else(|| AppointmentError::Validation("Appointment has an empty time window".to_string()))?;

        let availability = self.availability
            .evaluate(appointment.doctor_id, window, Some(appointment.id))
            .await?;
        if let Availability::Unavailable(reason) = availability {
            warn!("Cannot move appointment {} to {}: {:?}", appointment.id, new_start, reason);
            return Err(AppointmentError::SlotUnavailable);
        }

        appointment.scheduled_start = window.start;
        appointment.scheduled_end = window.end;
        appointment.updated_at = Utc::now();

        self.context
            .store()
            .update(&appointment)
            .await
            .map_err(|e| store_failure(e, appointment.id))
    }

    // ==========================================================================
    // STATUS CHANGES
    // ==========================================================================

    #[instrument(skip(self, notes))]
    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let existing = self.load(appointment_id).await?;
        let token = self.locks.acquire(existing.doctor_id).await?;
        let result = self.within_deadline(self.commit_transition(appointment_id, new_status, notes)).await;
        self.locks.release(token).await;

        let appointment = result?;
        info!("Appointment {} is now {}", appointment.id, appointment.status);

        if appointment.status == AppointmentStatus::Cancelled {
            self.notify(AppointmentEvent::cancelled(appointment.id));
        }

        Ok(appointment)
    }

    async fn commit_transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.load(appointment_id).await?;

        self.lifecycle.apply_transition(&mut appointment, new_status, Utc::now())?;
        if let Some(note) = notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            appointment.append_note(note);
        }

        self.context
            .store()
            .update(&appointment)
            .await
            .map_err(|e| store_failure(e, appointment.id))
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let note = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .map(|r| format!("Cancelled: {}", r));

        self.transition_status(appointment_id, AppointmentStatus::Cancelled, note).await
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    /// Abandons `commit` once the commit timeout passes, which is always
    /// before the doctor lock can expire.
    async fn within_deadline<T, F>(&self, commit: F) -> Result<T, AppointmentError>
    where
        F: Future<Output = Result<T, AppointmentError>>,
    {
        let limit = self.context.settings().commit_timeout;
        tokio::time::timeout(limit, commit).await.unwrap_or_else(|_| {
            error!("Commit did not finish within {:?}, abandoned", limit);
            Err(AppointmentError::Persistence(format!(
                "commit exceeded {:?}",
                limit
            )))
        })
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.context
            .store()
            .get(appointment_id)
            .await
            .map_err(|e| store_failure(e, appointment_id))?
            .ok_or(AppointmentError::NotFound)
    }

    /// Fire-and-forget hand-off; the caller's result never depends on it.
    fn notify(&self, event: AppointmentEvent) {
        let notifier = Arc::clone(self.context.notifier());
        let appointment_id = event.appointment_id;
        let kind = event.kind;

        tokio::spawn(async move {
            if let Err(e) = notifier.publish(event).await {
                warn!("Failed to publish {:?} for appointment {}: {}", kind, appointment_id, e);
            }
        });
    }
}

fn store_failure(e: StoreError, appointment_id: Uuid) -> AppointmentError {
    match e {
        StoreError::Conflict => {
            warn!("Store rejected appointment {} as overlapping", appointment_id);
            AppointmentError::SlotUnavailable
        }
        StoreError::NotFound(_) => AppointmentError::NotFound,
        StoreError::Backend(message) => {
            error!("Persistence failure for appointment {}: {}", appointment_id, message);
            AppointmentError::Persistence(message)
        }
    }
}
