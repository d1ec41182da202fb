//! Hub engine
//!
//! This module contains the in-memory registry and broadcaster responsible for:
//! - tracking which connections are watching which match
//! - fanning each event out to every connection of its match
//! - evicting connections whose outbound queue is full
//! - running the intake loop that the broker bridge feeds
//!
//! Concurrency and usage notes:
//! - The registry sits behind a single `RwLock` that is never held across an
//!   `.await` or any socket I/O. Broadcasts take the read lock, so fan-out to
//!   different matches proceeds in parallel; register/unregister and slow
//!   consumer eviction take the write lock.
//! - Fan-out only ever calls `Connection::try_enqueue`, so a stalled viewer
//!   cannot block the hub or delay other viewers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::Utf8Bytes;

use crate::connection::{Connection, EnqueueError};
use crate::event::{Event, MatchId};
use crate::hub::subscribers::MatchSubscribers;
use crate::utils::shutdown;

/// Outcome of a single [`Hub::broadcast`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that accepted the message into their queue.
    pub delivered: usize,
    /// Connections removed because their queue was full or closed.
    pub evicted: usize,
}

#[derive(Debug, Default)]
pub struct Hub {
    matches: RwLock<HashMap<MatchId, MatchSubscribers>>,
}

impl Hub {
    pub const DEFAULT_INTAKE_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Bounded channel feeding [`Hub::run`]. The hub keeps no sender of its
    /// own, so dropping every returned sender ends the dispatch loop.
    pub fn intake_channel(capacity: usize) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        mpsc::channel(capacity.max(1))
    }

    /// Add a connection to its match's set, creating the set if needed.
    ///
    /// Registering the same connection twice is a no-op. A connection whose
    /// queue has already been closed has reached its terminal state and is
    /// not added back; `false` is returned in that case.
    pub fn register(&self, conn: Arc<Connection>) -> bool {
        let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        if conn.is_closed() {
            warn!(conn = %conn.id(), match_id = %conn.match_id(), "refusing to register closed connection");
            return false;
        }

        let match_id = conn.match_id();
        let id = conn.id().to_string();
        let viewer = conn.viewer().map(str::to_string);
        let subscribers = matches
            .entry(match_id)
            .or_default();
        if subscribers.insert(conn) {
            info!(
                conn = %id,
                match_id = %match_id,
                viewer = viewer.as_deref().unwrap_or("-"),
                watchers = subscribers.len(),
                "connection registered"
            );
        }
        true
    }

    /// Remove a connection and close its outbound queue.
    ///
    /// Safe to call any number of times; only the first call has an effect.
    /// Returns whether the connection was found in the registry.
    pub fn unregister(&self, conn: &Connection) -> bool {
        let match_id = conn.match_id();
        let removed = {
            let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
            let removed = match matches.get_mut(&match_id) {
                Some(subscribers) => {
                    let removed = subscribers.remove(conn.id());
                    if subscribers.is_empty() {
                        matches.remove(&match_id);
                    }
                    removed
                }
                None => false,
            };
            // closed under the lock so a concurrent register cannot revive it
            conn.close_queue();
            removed
        };

        if removed {
            info!(conn = %conn.id(), match_id = %match_id, "connection unregistered");
        }
        removed
    }

    /// Fan an event out to every connection watching its match.
    ///
    /// The event is serialized once. Connections that cannot take the message
    /// immediately are evicted after the pass. No subscribers is not an error.
    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        let payload: Utf8Bytes = match event.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(match_id = %event.match_id(), error = %e, "failed to serialize event");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        let mut slow = Vec::new();
        {
            let matches = self.matches.read().unwrap_or_else(PoisonError::into_inner);
            let Some(subscribers) = matches.get(&event.match_id()) else {
                debug!(
                    match_id = %event.match_id(),
                    kind = event.type_tag(),
                    "no watchers, event dropped"
                );
                return report;
            };

            for conn in subscribers.iter() {
                match conn.try_enqueue(WsMessage::text(payload.clone())) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        debug!(conn = %conn.id(), error = %e, "enqueue failed");
                        if e == EnqueueError::Full {
                            conn.mark_evicted();
                        }
                        slow.push(Arc::clone(conn));
                    }
                }
            }
        }

        for conn in slow {
            if self.unregister(&conn) {
                report.evicted += 1;
                warn!(conn = %conn.id(), match_id = %conn.match_id(), "slow consumer evicted");
            }
        }
        report
    }

    /// Consume `intake` until shutdown is signalled or every sender is gone,
    /// broadcasting each event in arrival order.
    pub async fn run(
        self: Arc<Self>,
        mut intake: mpsc::Receiver<Event>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("hub dispatch loop started");
        loop {
            tokio::select! {
                _ = shutdown::signalled(&mut shutdown_rx) => break,
                received = intake.recv() => match received {
                    Some(event) => {
                        self.broadcast(&event);
                    }
                    None => {
                        debug!("hub intake closed");
                        break;
                    }
                },
            }
        }
        info!("hub dispatch loop stopped");
    }

    pub fn match_count(&self) -> usize {
        self.matches.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn connection_count(&self, match_id: MatchId) -> usize {
        self.matches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&match_id)
            .map_or(0, MatchSubscribers::len)
    }

    pub fn is_registered(&self, conn: &Connection) -> bool {
        self.matches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&conn.match_id())
            .is_some_and(|subscribers| subscribers.contains(conn.id()))
    }

    /// Snapshot of the matches that currently have at least one watcher.
    pub fn active_matches(&self) -> Vec<MatchId> {
        let mut ids: Vec<_> = self
            .matches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }
}
