// libs/appointment-cell/src/services/schedule.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::context::SchedulingContext;
use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, DaySchedule, DoctorSchedule,
};
use crate::services::store::StoreError;

pub const MAX_SCHEDULE_RANGE_DAYS: i64 = 30;
pub const DEFAULT_UPCOMING_DAYS: i64 = 7;
pub const MAX_UPCOMING_DAYS: i64 = 30;

/// Read models over stored appointments. Nothing here takes a lock.
pub struct AppointmentQueryService {
    context: Arc<SchedulingContext>,
}

impl AppointmentQueryService {
    pub fn new(context: Arc<SchedulingContext>) -> Self {
        Self { context }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.context
            .store()
            .get(appointment_id)
            .await
            .map_err(read_failure)?
            .ok_or(AppointmentError::NotFound)
    }

    /// Appointments of every status grouped by clinic-local day; each date in
    /// `[start_date, end_date]` is present even when empty.
    pub async fn doctor_schedule(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<DoctorSchedule, AppointmentError> {
        if end_date < start_date {
            return Err(AppointmentError::Validation(
                "End date must not be before start date".to_string(),
            ));
        }
        if (end_date - start_date).num_days() > MAX_SCHEDULE_RANGE_DAYS {
            return Err(AppointmentError::Validation(format!(
                "Date range cannot exceed {} days",
                MAX_SCHEDULE_RANGE_DAYS
            )));
        }

        self.context
            .directory()
            .get_doctor(doctor_id)
            .await
            .map_err(|e| AppointmentError::Persistence(e.to_string()))?
            .ok_or(AppointmentError::DoctorNotFound)?;

        let offset = self.context.settings().clinic_offset;
        let from = local_midnight(start_date, offset)?;
        let to = local_midnight(end_date + Duration::days(1), offset)?;

        let appointments = self.context
            .store()
            .list_for_doctor(doctor_id, from, to)
            .await
            .map_err(read_failure)?;

        let mut by_day: BTreeMap<NaiveDate, Vec<Appointment>> = start_date
            .iter_days()
            .take_while(|d| *d <= end_date)
            .map(|d| (d, Vec::new()))
            .collect();

        for appointment in appointments {
            let day = appointment.scheduled_start.with_timezone(&offset).date_naive();
            if let Some(bucket) = by_day.get_mut(&day) {
                bucket.push(appointment);
            }
        }

        debug!("Built schedule for doctor {} from {} to {}", doctor_id, start_date, end_date);

        Ok(DoctorSchedule {
            doctor_id,
            start_date,
            end_date,
            days: by_day
                .into_iter()
                .map(|(date, appointments)| DaySchedule { date, appointments })
                .collect(),
        })
    }

    /// Scheduled or confirmed appointments starting within the next `days_ahead` days.
    pub async fn upcoming(&self, days_ahead: Option<i64>) -> Result<Vec<Appointment>, AppointmentError> {
        let days = days_ahead.unwrap_or(DEFAULT_UPCOMING_DAYS);
        if !(1..=MAX_UPCOMING_DAYS).contains(&days) {
            return Err(AppointmentError::Validation(format!(
                "days_ahead must be between 1 and {}",
                MAX_UPCOMING_DAYS
            )));
        }

        let now = Utc::now();
        self.context
            .store()
            .list_in_range(now, now + Duration::days(days), &AppointmentStatus::ACTIVE)
            .await
            .map_err(read_failure)
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>, AppointmentError> {
    offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppointmentError::Validation(format!("Date {} is out of range", date)))
}

fn read_failure(e: StoreError) -> AppointmentError {
    match e {
        StoreError::NotFound(_) => AppointmentError::NotFound,
        other => AppointmentError::Persistence(other.to_string()),
    }
}
