// libs/appointment-cell/src/services/locking.rs
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use scheduling_lock_cell::{LockKey, LockToken, SchedulingLock};

use crate::context::SchedulingSettings;
use crate::models::AppointmentError;

/// Whole-doctor exclusion around every check-and-write. Any two overlapping
/// candidate windows for one doctor share this key, so at most one of them
/// can be validated and committed at a time.
pub struct DoctorLocks {
    locks: Arc<dyn SchedulingLock>,
    settings: SchedulingSettings,
}

impl DoctorLocks {
    pub fn new(locks: Arc<dyn SchedulingLock>, settings: SchedulingSettings) -> Self {
        Self { locks, settings }
    }

    /// A timeout or a lock-backend failure both read as "slot unavailable".
    pub async fn acquire(&self, doctor_id: Uuid) -> Result<LockToken, AppointmentError> {
        let key = LockKey::doctor(doctor_id);

        self.locks
            .acquire(&key, self.settings.lock_wait_timeout, self.settings.lock_hold_timeout)
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("Timed out waiting for scheduling lock of doctor {}", doctor_id);
                } else {
                    warn!("Scheduling lock for doctor {} failed: {}", doctor_id, e);
                }
                AppointmentError::SlotUnavailable
            })
    }

    /// Never fails the caller; an unreleased lock simply expires.
    pub async fn release(&self, token: LockToken) {
        let key = token.key.clone();
        match self.locks.release(token).await {
            Ok(true) => debug!("Released scheduling lock {}", key),
            Ok(false) => debug!("Scheduling lock {} had already expired", key),
            Err(e) => warn!("Failed to release scheduling lock {}: {}", key, e),
        }
    }
}
