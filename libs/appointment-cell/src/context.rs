// libs/appointment-cell/src/context.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use doctor_cell::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
use notification_queue_cell::{
    AppointmentEvent, AppointmentNotifier, ChannelNotifier, NotificationError,
    RedisNotificationProducer,
};
use scheduling_lock_cell::{InProcessLockService, LockError, RedisLockService, SchedulingLock};
use shared_config::AppConfig;

use crate::services::store::{AppointmentStore, InMemoryAppointmentStore};
use crate::services::supabase_store::SupabaseAppointmentStore;

// ==============================================================================
// SETTINGS
// ==============================================================================

/// Tunables shared by every booking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingSettings {
    pub lock_wait_timeout: Duration,
    pub lock_hold_timeout: Duration,
    /// Deadline for the check-and-write done under a lock. Must stay below
    /// `lock_hold_timeout` so the lock cannot expire mid-commit.
    pub commit_timeout: Duration,
    /// Offset in which doctors' working hours are written.
    pub clinic_offset: FixedOffset,
    pub slot_min_minutes: i64,
    pub slot_max_minutes: i64,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SchedulingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let clinic_offset = FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| {
                warn!(
                    "Clinic UTC offset of {} minutes is out of range, using UTC",
                    config.clinic_utc_offset_minutes
                );
                Utc.fix()
            });

        Self {
            lock_wait_timeout: Duration::from_millis(config.lock_wait_timeout_ms),
            lock_hold_timeout: Duration::from_millis(config.lock_hold_timeout_ms),
            commit_timeout: Duration::from_millis(config.commit_timeout_ms),
            clinic_offset,
            slot_min_minutes: config.slot_min_minutes,
            slot_max_minutes: config.slot_max_minutes,
        }
    }

    pub fn validate(&self) -> Result<(), ContextError> {
        if self.commit_timeout.is_zero() {
            return Err(ContextError::InvalidSettings(
                "commit timeout must be positive".to_string(),
            ));
        }
        if self.lock_hold_timeout <= self.commit_timeout {
            return Err(ContextError::InvalidSettings(format!(
                "lock hold timeout {:?} must be longer than commit timeout {:?}",
                self.lock_hold_timeout, self.commit_timeout
            )));
        }
        Ok(())
    }
}

// ==============================================================================
// CONTEXT
// ==============================================================================

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Scheduling lock backend unavailable: {0}")]
    Lock(#[from] LockError),

    #[error("Notification backend unavailable: {0}")]
    Notification(#[from] NotificationError),

    #[error("Invalid scheduling settings: {0}")]
    InvalidSettings(String),
}

/// Explicit bundle of every collaborator the booking engine talks to.
/// Built once at startup and shared behind an `Arc`.
#[derive(Clone)]
pub struct SchedulingContext {
    directory: Arc<dyn DoctorDirectory>,
    store: Arc<dyn AppointmentStore>,
    locks: Arc<dyn SchedulingLock>,
    notifier: Arc<dyn AppointmentNotifier>,
    settings: SchedulingSettings,
}

impl SchedulingContext {
    pub fn new(
        directory: Arc<dyn DoctorDirectory>,
        store: Arc<dyn AppointmentStore>,
        locks: Arc<dyn SchedulingLock>,
        notifier: Arc<dyn AppointmentNotifier>,
        settings: SchedulingSettings,
    ) -> Self {
        Self {
            directory,
            store,
            locks,
            notifier,
            settings,
        }
    }

    pub fn builder() -> SchedulingContextBuilder {
        SchedulingContextBuilder::default()
    }

    /// Picks Supabase or in-memory persistence, and Redis or in-process
    /// locking/notification, from what the configuration provides.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ContextError> {
        let settings = SchedulingSettings::from_config(config);
        settings.validate()?;

        let (directory, store): (Arc<dyn DoctorDirectory>, Arc<dyn AppointmentStore>) =
            if config.is_configured() {
                info!("Using Supabase for appointments and doctor schedules");
                (
                    Arc::new(SupabaseDoctorDirectory::new(config)),
                    Arc::new(SupabaseAppointmentStore::new(config)),
                )
            } else {
                warn!("Supabase is not configured, appointments are kept in memory");
                (
                    Arc::new(InMemoryDoctorDirectory::new()),
                    Arc::new(InMemoryAppointmentStore::new()),
                )
            };

        let (locks, notifier): (Arc<dyn SchedulingLock>, Arc<dyn AppointmentNotifier>) =
            if config.is_redis_configured() {
                info!("Using Redis for scheduling locks and notification queue");
                (
                    Arc::new(RedisLockService::new(config).await?),
                    Arc::new(RedisNotificationProducer::new(config).await?),
                )
            } else {
                info!("Redis is not configured, using in-process scheduling locks");
                (Arc::new(InProcessLockService::new()), in_process_notifier())
            };

        Ok(Self::new(directory, store, locks, notifier, settings))
    }

    pub fn directory(&self) -> &Arc<dyn DoctorDirectory> {
        &self.directory
    }

    pub fn store(&self) -> &Arc<dyn AppointmentStore> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<dyn SchedulingLock> {
        &self.locks
    }

    pub fn notifier(&self) -> &Arc<dyn AppointmentNotifier> {
        &self.notifier
    }

    pub fn settings(&self) -> &SchedulingSettings {
        &self.settings
    }
}

/// Channel notifier whose events are drained into the log.
fn in_process_notifier() -> Arc<dyn AppointmentNotifier> {
    let (notifier, receiver) = ChannelNotifier::channel();

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(log_events(receiver));
        }
        Err(_) => warn!("No async runtime available, appointment events will be dropped"),
    }

    Arc::new(notifier)
}

async fn log_events(mut receiver: mpsc::UnboundedReceiver<AppointmentEvent>) {
    while let Some(event) = receiver.recv().await {
        info!(
            "Appointment event {:?} for appointment {} (event {})",
            event.kind, event.appointment_id, event.event_id
        );
    }
}

// ==============================================================================
// BUILDER
// ==============================================================================

/// Assembles a context from explicit parts; anything left unset falls back
/// to its in-process implementation.
#[derive(Default)]
pub struct SchedulingContextBuilder {
    directory: Option<Arc<dyn DoctorDirectory>>,
    store: Option<Arc<dyn AppointmentStore>>,
    locks: Option<Arc<dyn SchedulingLock>>,
    notifier: Option<Arc<dyn AppointmentNotifier>>,
    settings: Option<SchedulingSettings>,
}

impl SchedulingContextBuilder {
    pub fn directory(mut self, directory: Arc<dyn DoctorDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn store(mut self, store: Arc<dyn AppointmentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn locks(mut self, locks: Arc<dyn SchedulingLock>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn AppointmentNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn settings(mut self, settings: SchedulingSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> SchedulingContext {
        SchedulingContext::new(
            self.directory.unwrap_or_else(|| Arc::new(InMemoryDoctorDirectory::new())),
            self.store.unwrap_or_else(|| Arc::new(InMemoryAppointmentStore::new())),
            self.locks.unwrap_or_else(|| Arc::new(InProcessLockService::new())),
            self.notifier.unwrap_or_else(in_process_notifier),
            self.settings.unwrap_or_default(),
        )
    }
}
