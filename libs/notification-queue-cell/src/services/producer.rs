use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::services::AppointmentNotifier;
use crate::{AppointmentEvent, NotificationError};

pub const PENDING_QUEUE_KEY: &str = "appointment_notifications:pending";

/// Pushes events onto a Redis list consumed by the reminder workers.
pub struct RedisNotificationProducer {
    pool: Pool,
    queue_key: String,
}

impl RedisNotificationProducer {
    pub async fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        let redis_url = config.redis_url.clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            NotificationError::RedisError(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to create Redis pool",
                format!("Pool creation error: {}", e),
            )))
        })?;

        let producer = Self::from_pool(pool, PENDING_QUEUE_KEY);

        // Test connection
        let mut conn = producer.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis notification producer initialized successfully");

        Ok(producer)
    }

    pub fn from_pool(pool: Pool, queue_key: impl Into<String>) -> Self {
        Self {
            pool,
            queue_key: queue_key.into(),
        }
    }

    async fn get_connection(&self) -> Result<Connection, NotificationError> {
        self.pool.get().await.map_err(|e| {
            NotificationError::RedisError(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to get Redis connection",
                e.to_string(),
            )))
        })
    }
}

#[async_trait]
impl AppointmentNotifier for RedisNotificationProducer {
    async fn publish(&self, event: AppointmentEvent) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        let payload = serde_json::to_string(&event)?;

        let _: () = conn.lpush(&self.queue_key, payload).await?;

        debug!("Event {:?} for appointment {} queued", event.kind, event.appointment_id);
        Ok(())
    }
}
