#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentStore, CreateBookingRequest, InMemoryAppointmentStore,
    SchedulingContext, SchedulingSettings, StoreError,
};
use appointment_cell::models::AppointmentStatus;
use doctor_cell::{DoctorScheduleView, InMemoryDoctorDirectory, WeeklySchedule};
use notification_queue_cell::{AppointmentEvent, ChannelNotifier};
use shared_models::TimeWindow;

/// A clinic with one doctor on the stock schedule (weekdays 09:00-18:00,
/// lunch 13:00-14:00, 30 minute appointments) and in-memory backends.
pub struct TestClinic {
    pub context: Arc<SchedulingContext>,
    pub directory: Arc<InMemoryDoctorDirectory>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub events: UnboundedReceiver<AppointmentEvent>,
    pub doctor_id: Uuid,
}

pub fn test_settings() -> SchedulingSettings {
    SchedulingSettings {
        lock_wait_timeout: StdDuration::from_secs(2),
        lock_hold_timeout: StdDuration::from_secs(5),
        ..SchedulingSettings::default()
    }
}

pub async fn clinic() -> TestClinic {
    clinic_with_store(Arc::new(InMemoryAppointmentStore::new())).await
}

pub async fn clinic_with_store(store: Arc<InMemoryAppointmentStore>) -> TestClinic {
    let directory = Arc::new(InMemoryDoctorDirectory::new());
    let doctor_id = Uuid::new_v4();
    directory
        .upsert(DoctorScheduleView::new(
            doctor_id,
            WeeklySchedule::clinic_default(),
            Duration::minutes(30),
        ))
        .await;

    let (notifier, events) = ChannelNotifier::channel();
    let context = SchedulingContext::builder()
        .directory(directory.clone())
        .store(store.clone())
        .notifier(Arc::new(notifier))
        .settings(test_settings())
        .build();

    TestClinic {
        context: Arc::new(context),
        directory,
        store,
        events,
        doctor_id,
    }
}

/// The first `weekday` strictly after today, so bookings are in the future.
pub fn next_weekday(weekday: Weekday) -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != weekday {
        date += Duration::days(1);
    }
    date
}

pub fn next_monday() -> NaiveDate {
    next_weekday(Weekday::Mon)
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), hour, minute, 0)
        .unwrap()
}

pub fn booking_request(doctor_id: Uuid, start: DateTime<Utc>) -> CreateBookingRequest {
    CreateBookingRequest {
        patient_id: Uuid::new_v4(),
        doctor_id,
        start_time: start,
        appointment_type: None,
        reason: Some("Routine check".to_string()),
        notes: None,
    }
}

/// Writes an appointment straight into the store, bypassing the booking flow.
pub async fn seed_appointment(
    store: &InMemoryAppointmentStore,
    doctor_id: Uuid,
    start: DateTime<Utc>,
    minutes: i64,
    status: AppointmentStatus,
) -> Appointment {
    let window = TimeWindow::starting_at(start, Duration::minutes(minutes)).unwrap();
    let mut appointment = Appointment::scheduled(Uuid::new_v4(), doctor_id, window, None, None, None);
    appointment.status = status;
    store.insert(&appointment).await.unwrap()
}

/// Store whose writes always fail, as if the database went away mid-commit.
pub struct FailingWritesStore {
    pub inner: InMemoryAppointmentStore,
}

impl FailingWritesStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryAppointmentStore::new(),
        }
    }
}

#[async_trait]
impl AppointmentStore for FailingWritesStore {
    async fn insert(&self, _appointment: &Appointment) -> Result<Appointment, StoreError> {
        Err(StoreError::Backend("write timeout on primary db-01".to_string()))
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.inner.get(appointment_id).await
    }

    async fn update(&self, _appointment: &Appointment) -> Result<Appointment, StoreError> {
        Err(StoreError::Backend("write timeout on primary db-01".to_string()))
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        window: TimeWindow,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.find_overlapping(doctor_id, window, statuses).await
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_for_doctor(doctor_id, from, to).await
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_in_range(from, to, statuses).await
    }
}

/// Plain row list with no overlap guard of its own, so only the doctor lock
/// keeps bookings apart. Writes wait `write_delay` before touching the rows.
pub struct UnguardedStore {
    rows: RwLock<Vec<Appointment>>,
    write_delay: StdDuration,
}

impl UnguardedStore {
    pub fn new(write_delay: StdDuration) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            write_delay,
        }
    }

    pub async fn all(&self) -> Vec<Appointment> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by_key(|a| a.scheduled_start);
        rows
    }
}

#[async_trait]
impl AppointmentStore for UnguardedStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        tokio::time::sleep(self.write_delay).await;
        self.rows.write().await.push(appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.rows.read().await.iter().find(|a| a.id == appointment_id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        tokio::time::sleep(self.write_delay).await;
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|a| a.id == appointment.id)
            .ok_or(StoreError::NotFound(appointment.id))?;
        *row = appointment.clone();
        Ok(appointment.clone())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        window: TimeWindow,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut matches: Vec<Appointment> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|a| a.doctor_id == doctor_id && statuses.contains(&a.status))
            .filter(|a| a.window().overlaps(&window))
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.scheduled_start);
        Ok(matches)
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self
            .all()
            .await
            .into_iter()
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| a.scheduled_start >= from && a.scheduled_start < to)
            .collect())
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self
            .all()
            .await
            .into_iter()
            .filter(|a| statuses.contains(&a.status))
            .filter(|a| a.scheduled_start >= from && a.scheduled_start < to)
            .collect())
    }
}

/// Context over `store` with the stock test doctor from `clinic`.
pub fn context_with_store(
    clinic: &TestClinic,
    store: Arc<dyn AppointmentStore>,
    settings: SchedulingSettings,
) -> Arc<SchedulingContext> {
    Arc::new(
        SchedulingContext::builder()
            .directory(clinic.directory.clone())
            .store(store)
            .settings(settings)
            .build(),
    )
}
