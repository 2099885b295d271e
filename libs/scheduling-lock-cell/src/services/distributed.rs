use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::services::SchedulingLock;
use crate::{LockError, LockKey, LockToken};

/// Deletes the key only if it still carries our token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Redis lock: `SET key token NX PX hold` to acquire, compare-and-delete to release.
pub struct RedisLockService {
    pool: Pool,
    retry_interval: Duration,
}

impl RedisLockService {
    pub async fn new(config: &AppConfig) -> Result<Self, LockError> {
        let redis_url = config.redis_url.clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            LockError::RedisError(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to create Redis pool",
                format!("Pool creation error: {}", e),
            )))
        })?;

        let service = Self::from_pool(pool);

        // Test connection
        let mut conn = service.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis scheduling lock service initialized successfully");

        Ok(service)
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            retry_interval: RETRY_INTERVAL,
        }
    }

    async fn get_connection(&self) -> Result<Connection, LockError> {
        self.pool.get().await.map_err(|e| {
            LockError::RedisError(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to get Redis connection",
                e.to_string(),
            )))
        })
    }

    async fn try_set(
        &self,
        conn: &mut Connection,
        lock_token: &LockToken,
        hold_timeout: Duration,
    ) -> Result<bool, LockError> {
        let hold_ms = hold_timeout.as_millis().max(1) as u64;
        let reply: Option<String> = redis::cmd("SET")
            .arg(lock_token.key.as_str())
            .arg(lock_token.token.to_string())
            .arg("NX")
            .arg("PX")
            .arg(hold_ms)
            .query_async(conn)
            .await?;

        Ok(reply.is_some())
    }
}

#[async_trait]
impl SchedulingLock for RedisLockService {
    async fn acquire(
        &self,
        key: &LockKey,
        wait_timeout: Duration,
        hold_timeout: Duration,
    ) -> Result<LockToken, LockError> {
        let started = Instant::now();
        let deadline = started + wait_timeout;
        let mut conn = self.get_connection().await?;

        loop {
            let lock_token = LockToken::new(key.clone(), hold_timeout);
            if self.try_set(&mut conn, &lock_token, hold_timeout).await? {
                debug!("Redis lock {} acquired", key);
                return Ok(lock_token);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Gave up waiting for Redis lock {}", key);
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited_ms: (now - started).as_millis() as u64,
                });
            }

            tokio::time::sleep_until(deadline.min(now + self.retry_interval)).await;
        }
    }

    async fn release(&self, token: LockToken) -> Result<bool, LockError> {
        let mut conn = self.get_connection().await?;

        let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(token.key.as_str())
            .arg(token.token.to_string())
            .invoke_async(&mut conn)
            .await?;

        if deleted == 1 {
            debug!("Redis lock {} released", token.key);
            Ok(true)
        } else {
            warn!("Redis lock {} was no longer owned at release time", token.key);
            Ok(false)
        }
    }
}
