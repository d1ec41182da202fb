//! Per-match subscriber set
//!
//! A `MatchSubscribers` holds the live connections for one match, keyed by
//! connection id so duplicate registrations are a no-op.
//!
//! Concurrency note: callers must synchronize access (the hub's registry lock)
//! when modifying the set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionId};

#[derive(Debug, Default)]
pub struct MatchSubscribers {
    connections: HashMap<ConnectionId, Arc<Connection>>,
}

impl MatchSubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `false` if it was already present.
    pub fn insert(&mut self, conn: Arc<Connection>) -> bool {
        if self.connections.contains_key(conn.id()) {
            return false;
        }
        self.connections.insert(conn.id().to_string(), conn);
        true
    }

    /// Remove a connection by id. Returns `false` if it was not present.
    pub fn remove(&mut self, id: &str) -> bool {
        self.connections.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.connections.values()
    }
}
