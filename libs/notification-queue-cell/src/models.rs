use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    AppointmentCreated,
    AppointmentCancelled,
}

/// Identifier-only hand-off to the reminder/notification workers. Consumers
/// load whatever appointment details they need themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentEvent {
    pub event_id: Uuid,
    pub appointment_id: Uuid,
    pub kind: AppointmentEventKind,
    pub emitted_at: DateTime<Utc>,
}

impl AppointmentEvent {
    pub fn new(appointment_id: Uuid, kind: AppointmentEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            appointment_id,
            kind,
            emitted_at: Utc::now(),
        }
    }

    pub fn created(appointment_id: Uuid) -> Self {
        Self::new(appointment_id, AppointmentEventKind::AppointmentCreated)
    }

    pub fn cancelled(appointment_id: Uuid) -> Self {
        Self::new(appointment_id, AppointmentEventKind::AppointmentCancelled)
    }
}
