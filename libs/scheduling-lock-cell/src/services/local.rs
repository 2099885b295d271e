use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::SchedulingLock;
use crate::{LockError, LockKey, LockToken};

struct Holder {
    token: Uuid,
    expires_at: Instant,
}

/// Per-key mutex with TTL for single-process deployments.
///
/// The holder table is guarded by a synchronous mutex that is never held
/// across an await point; waiters park on `released` or on the current
/// holder's expiry, whichever comes first.
#[derive(Default)]
pub struct InProcessLockService {
    holders: Mutex<HashMap<LockKey, Holder>>,
    released: Notify,
}

impl InProcessLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take the lock; on failure returns when the current holder expires.
    fn try_take(&self, key: &LockKey, token: Uuid, hold: Duration) -> Result<(), Instant> {
        let mut holders = self.holders.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();

        if let Some(holder) = holders.get(key) {
            if holder.expires_at > now {
                return Err(holder.expires_at);
            }
            warn!("Lock {} expired while held, reclaiming", key);
        }

        holders.insert(key.clone(), Holder { token, expires_at: now + hold });
        Ok(())
    }
}

#[async_trait]
impl SchedulingLock for InProcessLockService {
    async fn acquire(
        &self,
        key: &LockKey,
        wait_timeout: Duration,
        hold_timeout: Duration,
    ) -> Result<LockToken, LockError> {
        let started = Instant::now();
        let deadline = started + wait_timeout;

        loop {
            // Register interest before checking, so a release between the
            // check and the wait is not missed.
            let released = self.released.notified();
            let lock_token = LockToken::new(key.clone(), hold_timeout);

            let holder_expires = match self.try_take(key, lock_token.token, hold_timeout) {
                Ok(()) => {
                    debug!("Lock {} acquired", key);
                    return Ok(lock_token);
                }
                Err(expires_at) => expires_at,
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited_ms: (now - started).as_millis() as u64,
                });
            }

            let wake_at = deadline.min(holder_expires);
            tokio::select! {
                _ = released => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn release(&self, token: LockToken) -> Result<bool, LockError> {
        let released = {
            let mut holders = self.holders.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match holders.get(&token.key) {
                Some(holder) if holder.token == token.token => {
                    holders.remove(&token.key);
                    true
                }
                _ => false,
            }
        };

        if released {
            debug!("Lock {} released", token.key);
            self.released.notify_waiters();
        } else {
            warn!("Lock {} was no longer owned at release time", token.key);
        }

        Ok(released)
    }
}
