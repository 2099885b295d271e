// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::TimeWindow;

use crate::models::{Appointment, AppointmentStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Appointment overlaps an existing booking")]
    Conflict,

    #[error("Appointment {0} does not exist")]
    NotFound(Uuid),

    #[error("Appointment store failure: {0}")]
    Backend(String),
}

/// Persistence for appointment rows. Each write is a single atomic operation.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;

    /// Appointments of `doctor_id` whose window overlaps `window`
    /// (`stored.start < window.end AND stored.end > window.start`),
    /// restricted to `statuses` and sorted by start.
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        window: TimeWindow,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Every appointment of the doctor starting in `[from, to)`, sorted by start.
    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Appointments starting in `[from, to)` with one of `statuses`, sorted by start.
    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError>;
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Store for single-process deployments and tests.
///
/// Writes refuse to create two overlapping active appointments for the
/// same doctor, mirroring an exclusion constraint on the real table.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn collides(rows: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
        if !candidate.is_blocking() {
            return false;
        }

        let window = candidate.window();
        rows.values().any(|existing| {
            existing.id != candidate.id
                && existing.doctor_id == candidate.doctor_id
                && existing.is_blocking()
                && existing.window().overlaps(&window)
        })
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| (a.scheduled_start, a.id));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.write().await;

        if Self::collides(&rows, appointment) {
            warn!("Rejected insert of appointment {}: overlaps an active booking", appointment.id);
            return Err(StoreError::Conflict);
        }

        rows.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment.clone())
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.rows.read().await.get(&appointment_id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.write().await;

        if !rows.contains_key(&appointment.id) {
            return Err(StoreError::NotFound(appointment.id));
        }
        if Self::collides(&rows, appointment) {
            warn!("Rejected update of appointment {}: overlaps an active booking", appointment.id);
            return Err(StoreError::Conflict);
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        window: TimeWindow,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let matches = rows
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| statuses.contains(&a.status))
            .filter(|a| a.window().overlaps(&window))
            .cloned()
            .collect();

        Ok(sorted(matches))
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let matches = rows
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| a.scheduled_start >= from && a.scheduled_start < to)
            .cloned()
            .collect();

        Ok(sorted(matches))
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let matches = rows
            .values()
            .filter(|a| statuses.contains(&a.status))
            .filter(|a| a.scheduled_start >= from && a.scheduled_start < to)
            .cloned()
            .collect();

        Ok(sorted(matches))
    }
}
