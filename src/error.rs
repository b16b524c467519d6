//! Error types for workq operations.
//!
//! Defines the error taxonomy shared by the queuing layers:
//! - Keyed store access (connection and round-trip failures)
//! - Work payload encoding and decoding
//! - Coordinator usage errors (queue handle registration)

use thiserror::Error;

use crate::config::ConfigError;
use crate::work::WorkState;

/// Errors raised by a keyed store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store connection could not be established.
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// A round trip to Redis failed.
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store answered with data the client cannot interpret.
    #[error("Store returned invalid data: {0}")]
    InvalidData(String),
}

/// Errors that can occur while encoding or decoding work payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode work '{work_id}': {source}")]
    Encode {
        work_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed work payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported work payload version {found} (max supported {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Errors surfaced by the work queuing coordinator.
///
/// Absent outcomes (empty queue, unknown work id) are never errors; they come
/// back as `None` or empty collections.
#[derive(Debug, Error)]
pub enum QueuingError {
    /// The keyed store is unreachable or a round trip failed.
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    /// A stored payload could not be decoded, or an item could not be encoded.
    #[error("Payload error: {0}")]
    Codec(#[from] CodecError),

    #[error("Queue '{0}' is already configured")]
    AlreadyConfigured(String),

    #[error("Queue '{0}' was not configured yet")]
    NotConfigured(String),

    /// The requested state has no membership collection to read from.
    #[error("Unsupported state for this operation: {0}")]
    UnsupportedState(WorkState),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl QueuingError {
    /// Returns true for programming errors in the way the coordinator is used,
    /// as opposed to store or payload faults.
    pub fn is_illegal_usage(&self) -> bool {
        matches!(
            self,
            QueuingError::AlreadyConfigured(_)
                | QueuingError::NotConfigured(_)
                | QueuingError::UnsupportedState(_)
        )
    }
}

impl From<redis::RedisError> for QueuingError {
    fn from(err: redis::RedisError) -> Self {
        QueuingError::Store(StoreError::Redis(err))
    }
}
