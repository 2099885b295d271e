pub mod local;
pub mod distributed;

pub use local::InProcessLockService;
pub use distributed::RedisLockService;

use std::time::Duration;

use async_trait::async_trait;

use crate::{LockError, LockKey, LockToken};

/// Bounded, time-scoped mutual exclusion.
///
/// `acquire` waits at most `wait_timeout`; a granted lock expires on its own
/// after `hold_timeout` even if never released.
#[async_trait]
pub trait SchedulingLock: Send + Sync {
    async fn acquire(
        &self,
        key: &LockKey,
        wait_timeout: Duration,
        hold_timeout: Duration,
    ) -> Result<LockToken, LockError>;

    /// Returns `false` when the lock had already expired or passed to
    /// another holder.
    async fn release(&self, token: LockToken) -> Result<bool, LockError>;
}
