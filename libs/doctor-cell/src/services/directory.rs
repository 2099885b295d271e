// libs/doctor-cell/src/services/directory.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{DoctorRecord, DoctorScheduleView};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Doctor directory unavailable: {0}")]
    Backend(String),

    #[error("Malformed doctor record: {0}")]
    Decode(String),
}

/// Read-only lookup of the working-hours view for a doctor.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorScheduleView>, DirectoryError>;
}

// ==============================================================================
// SUPABASE-BACKED DIRECTORY
// ==============================================================================

pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorScheduleView>, DirectoryError> {
        debug!("Fetching schedule view for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select=id,is_active,work_schedule,appointment_duration_minutes",
            doctor_id
        );

        let rows: Vec<serde_json::Value> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| DirectoryError::Backend(e.to_string()))?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let record: DoctorRecord = serde_json::from_value(row)
            .map_err(|e| DirectoryError::Decode(e.to_string()))?;

        Ok(Some(DoctorScheduleView::from(record)))
    }
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

/// Directory for single-process deployments and tests.
#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, DoctorScheduleView>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, doctor: DoctorScheduleView) {
        self.doctors.write().await.insert(doctor.doctor_id, doctor);
    }

    pub async fn set_active(&self, doctor_id: Uuid, is_active: bool) -> bool {
        match self.doctors.write().await.get_mut(&doctor_id) {
            Some(doctor) => {
                doctor.is_active = is_active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorScheduleView>, DirectoryError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }
}
