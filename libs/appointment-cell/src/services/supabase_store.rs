// libs/appointment-cell/src/services/supabase_store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseApiError, SupabaseClient};
use shared_models::TimeWindow;

use crate::models::{Appointment, AppointmentStatus};
use crate::services::store::{AppointmentStore, StoreError};

const TABLE_PATH: &str = "/rest/v1/appointments";

/// Appointment rows in the `appointments` table, reached through PostgREST.
///
/// Any HTTP 409 from the gateway (a unique or exclusion constraint the
/// deployment defines on the table) is reported as `StoreError::Conflict`.
/// Overlap protection itself comes from the doctor lock.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, query: String) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?{}", TABLE_PATH, query);
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_error)
    }
}

/// RFC 3339 with as many fractional digits as the value carries.
fn timestamp(value: DateTime<Utc>) -> String {
    urlencoding::encode(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
}

fn status_filter(statuses: &[AppointmentStatus]) -> String {
    let values: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
    format!("in.({})", values.join(","))
}

fn map_error(e: anyhow::Error) -> StoreError {
    match e.downcast_ref::<SupabaseApiError>() {
        Some(api_error) if api_error.is_conflict() => StoreError::Conflict,
        _ => StoreError::Backend(e.to_string()),
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        debug!("Inserting appointment {} for doctor {}", appointment.id, appointment.doctor_id);

        let body = serde_json::to_value(appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<Appointment> = self.supabase
            .request_with_headers(
                Method::POST,
                TABLE_PATH,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(map_error)?;

        rows.into_iter().next().ok_or_else(|| {
            error!("Insert of appointment {} returned no representation", appointment.id);
            StoreError::Backend("Insert returned no rows".to_string())
        })
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows = self.fetch(format!("id=eq.{}", appointment_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        debug!("Updating appointment {} ({})", appointment.id, appointment.status);

        let body = serde_json::to_value(appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let path = format!("{}?id=eq.{}", TABLE_PATH, appointment.id);

        let rows: Vec<Appointment> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(map_error)?;

        rows.into_iter().next().ok_or(StoreError::NotFound(appointment.id))
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        window: TimeWindow,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        self.fetch(format!(
            "doctor_id=eq.{}&scheduled_start=lt.{}&scheduled_end=gt.{}&status={}&order=scheduled_start.asc",
            doctor_id,
            timestamp(window.end),
            timestamp(window.start),
            status_filter(statuses),
        ))
        .await
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.fetch(format!(
            "doctor_id=eq.{}&scheduled_start=gte.{}&scheduled_start=lt.{}&order=scheduled_start.asc",
            doctor_id,
            timestamp(from),
            timestamp(to),
        ))
        .await
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        self.fetch(format!(
            "scheduled_start=gte.{}&scheduled_start=lt.{}&status={}&order=scheduled_start.asc",
            timestamp(from),
            timestamp(to),
            status_filter(statuses),
        ))
        .await
    }
}
