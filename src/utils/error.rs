//! The `error` module defines the error types used within `livefeed`.
//!
//! Each collaborator seam has its own error so callers can tell a transient
//! broker outage apart from a storage failure. The publisher wraps both in
//! `PublishError`, which is the only error surfaced to external callers.

use thiserror::Error;

/// Errors reported by a pub/sub broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached or refused the operation.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The subscription fell behind and `0` messages were skipped.
    #[error("subscription lagged, {0} messages skipped")]
    Lagged(u64),

    /// The subscription has ended and must be re-established.
    #[error("subscription closed")]
    Closed,
}

impl BrokerError {
    /// Whether the subscription that produced this error must be recreated.
    pub fn needs_resubscribe(&self) -> bool {
        matches!(self, BrokerError::Closed)
    }
}

/// Errors reported by the durable event log.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    /// A log entry could not be encoded on append or decoded on read.
    #[error("log entry codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the cache collaborator.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Failure of an [`EventPublisher`](crate::publisher::EventPublisher) call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The durable append failed; nothing was published.
    #[error("durable append failed: {0}")]
    Append(#[source] StorageError),

    /// The event is durably recorded but the live notification failed.
    #[error("live publish failed: {0}")]
    Broker(#[source] BrokerError),
}
