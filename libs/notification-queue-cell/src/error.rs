use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Notification channel closed")]
    ChannelClosed,
}
