//! Error types for store access.

use thiserror::Error;

/// Errors raised by a [`StatusStore`](crate::StatusStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store connection failed: {0}")]
    Connection(String),
}
