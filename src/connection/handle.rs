use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, Sender, error::TrySendError};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;
use uuid::Uuid;

use crate::event::MatchId;

pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound queue is closed")]
    Closed,
}

/// One live viewer of a match.
///
/// The connection owns the sending half of a bounded outbound queue; the
/// write pump owns the receiving half. Closing the queue (done by the hub on
/// unregister) is what tells the write pump to finish.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for the connection (UUID).
    id: ConnectionId,

    match_id: MatchId,

    /// Identity supplied by the viewer on subscribe, if any.
    viewer: Option<String>,

    /// `None` once the queue has been closed.
    queue: Mutex<Option<Sender<WsMessage>>>,

    evicted: AtomicBool,

    /// Milliseconds since UNIX epoch of the last inbound frame.
    last_activity: AtomicI64,
}

impl Connection {
    /// Create a connection for `match_id` with an outbound queue holding at
    /// most `capacity` messages. Returns the receiving half for the write pump.
    pub fn new(
        match_id: MatchId,
        viewer: Option<String>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id: Uuid::new_v4().to_string(),
            match_id,
            viewer,
            queue: Mutex::new(Some(tx)),
            evicted: AtomicBool::new(false),
            last_activity: AtomicI64::new(Utc::now().timestamp_millis()),
        };
        (Arc::new(conn), rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn viewer(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    /// Push a message without waiting. A full queue is reported, never awaited.
    pub fn try_enqueue(&self, msg: WsMessage) -> Result<(), EnqueueError> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = queue.as_ref() else {
            return Err(EnqueueError::Closed);
        };
        tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Drop the sending half. Returns `true` only for the call that closed it.
    pub(crate) fn close_queue(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub(crate) fn mark_evicted(&self) {
        self.evicted.store(true, Ordering::SeqCst);
    }

    /// Whether the hub dropped this connection for falling behind.
    pub fn was_evicted(&self) -> bool {
        self.evicted.load(Ordering::SeqCst)
    }

    /// Close frame sent to the viewer once the queue has been closed.
    pub fn close_frame(&self) -> WsMessage {
        let frame = if self.was_evicted() {
            CloseFrame {
                code: CloseCode::Policy,
                reason: "slow consumer".into(),
            }
        } else {
            CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }
        };
        WsMessage::Close(Some(frame))
    }

    pub fn touch(&self) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        let millis = self.last_activity.load(Ordering::Relaxed);
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}
