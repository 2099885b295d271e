use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Timed out after {waited_ms}ms waiting for lock {key}")]
    Timeout { key: String, waited_ms: u64 },

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Lock backend error: {0}")]
    Backend(String),
}

impl LockError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }
}
