use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key granularity for scheduling locks.
///
/// Booking writes lock the whole doctor: two overlapping but non-identical
/// candidate intervals must never pass the availability check concurrently,
/// which a per-start-time key cannot guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey(String);

impl LockKey {
    pub fn doctor(doctor_id: Uuid) -> Self {
        Self(format!("appointment_lock:doctor:{}", doctor_id))
    }

    pub fn custom(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof of ownership for a held lock. Only the holder of the matching
/// `token` can release it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    pub key: LockKey,
    pub token: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockToken {
    pub fn new(key: LockKey, hold_timeout: std::time::Duration) -> Self {
        let acquired_at = Utc::now();
        let hold = chrono::Duration::from_std(hold_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(5));
        Self {
            key,
            token: Uuid::new_v4(),
            acquired_at,
            expires_at: acquired_at + hold,
        }
    }
}
