//! The `persistence` module provides the durable event log and the cache.
//!
//! The event log is an append-only, per-match ordered record of every event
//! the publisher accepted; it is the source of truth for analytics and is
//! written before any live notification goes out. The cache holds derived
//! per-match views that the publisher invalidates when new events arrive.
//!
//! Both are reached through traits so the publisher does not care where they
//! live. The bundled implementations use `sled` as an embedded key-value
//! store.

pub mod cache;
pub mod sled_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::MatchId;
use crate::utils::error::{CacheError, StorageError};

pub use cache::SledCache;
pub use sled_store::SledEventLog;

/// One record in a match's durable log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub event_type: String,
    pub payload: Value,
    pub timestamp: i64,
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append to the match's log. Returns the entry's position in the log.
    async fn append(&self, match_id: MatchId, entry: &LogEntry) -> Result<u64, StorageError>;

    /// All retained entries for a match, oldest first.
    async fn read(&self, match_id: MatchId) -> Result<Vec<LogEntry>, StorageError>;
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Delete `key` if present. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Open (or create) the sled database shared by the log and the cache.
pub fn open_db(path: &str) -> Result<sled::Db, StorageError> {
    Ok(sled::open(path)?)
}
