//! Durable event log backed by `sled`
//!
//! Each match gets its own tree (`match:{id}:events`). Keys are ids from
//! `sled::Db::generate_id`, stored big-endian, so iteration yields entries in
//! append order and never collides even when two events share a timestamp.
//!
//! Configuration options supported:
//! - `max_events_per_match`: optional cap to limit storage per match; when
//!   exceeded the oldest entries are removed.

use async_trait::async_trait;
use sled::{Db, Tree};
use tracing::warn;

use crate::event::MatchId;
use crate::persistence::{EventLog, LogEntry};
use crate::utils::error::StorageError;

#[derive(Clone)]
pub struct SledEventLog {
    db: Db,
    max_events_per_match: Option<usize>,
}

impl SledEventLog {
    pub fn new(db: Db, max_events_per_match: Option<usize>) -> Self {
        Self {
            db,
            max_events_per_match,
        }
    }

    /// Open or create a sled database at `path` with the given policy.
    pub fn open(path: &str, max_events_per_match: Option<usize>) -> Result<Self, StorageError> {
        Ok(Self::new(super::open_db(path)?, max_events_per_match))
    }

    fn tree(&self, match_id: MatchId) -> Result<Tree, StorageError> {
        Ok(self.db.open_tree(format!("match:{match_id}:events"))?)
    }

    fn enforce_retention(&self, match_id: MatchId, tree: &Tree) {
        let Some(max) = self.max_events_per_match else {
            return;
        };
        let total = tree.len();
        if total <= max {
            return;
        }

        let keys_to_delete: Vec<_> = tree
            .iter()
            .take(total - max)
            .filter_map(|entry| entry.ok().map(|(k, _)| k))
            .collect();

        for key in keys_to_delete {
            if let Err(e) = tree.remove(key) {
                warn!(match_id = %match_id, error = %e, "failed to trim event log");
            }
        }
    }
}

#[async_trait]
impl EventLog for SledEventLog {
    async fn append(&self, match_id: MatchId, entry: &LogEntry) -> Result<u64, StorageError> {
        let serialized = serde_json::to_vec(entry)?;
        let tree = self.tree(match_id)?;
        let id = self.db.generate_id()?;

        tree.insert(id.to_be_bytes(), serialized)?;
        tree.flush_async().await?;

        self.enforce_retention(match_id, &tree);
        Ok(id)
    }

    async fn read(&self, match_id: MatchId) -> Result<Vec<LogEntry>, StorageError> {
        let tree = self.tree(match_id)?;
        tree.iter()
            .values()
            .map(|value| -> Result<LogEntry, StorageError> {
                Ok(serde_json::from_slice(&value?)?)
            })
            .collect()
    }
}

impl std::fmt::Debug for SledEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledEventLog")
            .field("db", &"sled::Db")
            .field("max_events_per_match", &self.max_events_per_match)
            .finish()
    }
}
