// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Legal next statuses, ignoring time-dependent conditions.
    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;

        match current_status {
            Scheduled => &[Confirmed, Cancelled, NoShow],
            Confirmed => &[InProgress, Cancelled, NoShow],
            InProgress => &[Completed],
            // Terminal states
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn validate_status_transition(
        &self,
        appointment: &Appointment,
        new_status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        let current_status = appointment.status;
        debug!("Validating status transition from {} to {}", current_status, new_status);

        let rejected = AppointmentError::InvalidStatusTransition {
            from: current_status,
            to: new_status,
        };

        if !self.valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(rejected);
        }

        if new_status == AppointmentStatus::NoShow
            && !self.should_mark_no_show(current_status, appointment.scheduled_start, now)
        {
            warn!(
                "Appointment {} cannot be marked no-show before its start at {}",
                appointment.id, appointment.scheduled_start
            );
            return Err(rejected);
        }

        Ok(())
    }

    /// Validates and applies the move, stamping actual start/end times.
    pub fn apply_transition(
        &self,
        appointment: &mut Appointment,
        new_status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.validate_status_transition(appointment, new_status, now)?;

        match new_status {
            AppointmentStatus::InProgress => appointment.actual_start = Some(now),
            AppointmentStatus::Completed => appointment.actual_end = Some(now),
            _ => {}
        }

        appointment.status = new_status;
        appointment.updated_at = now;
        Ok(())
    }

    /// A still-active appointment whose start has passed may be marked no-show.
    pub fn should_mark_no_show(
        &self,
        current_status: AppointmentStatus,
        scheduled_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        current_status.is_active() && now >= scheduled_start
    }
}
