//! Read and write loops for a single viewer socket.
//!
//! The two loops never share the socket: the caller splits it and hands the
//! stream half to [`read_pump`] and the sink half to [`write_pump`]. They
//! coordinate only through the hub, since whichever loop fails first
//! unregisters the connection, which closes the outbound queue, which ends the
//! write loop.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::config::HubSettings;
use crate::connection::Connection;
use crate::hub::Hub;

/// Shortest keepalive interval, used when `pong_wait` is too small to derive one.
pub const MIN_PING_PERIOD: Duration = Duration::from_millis(100);

/// Liveness and size limits applied to every viewer socket.
#[derive(Debug, Clone)]
pub struct PumpSettings {
    /// Largest inbound frame accepted from a viewer, in bytes.
    pub max_message_size: usize,
    /// Read deadline, renewed on every inbound frame.
    pub pong_wait: Duration,
    /// Upper bound for a single outbound write.
    pub write_wait: Duration,
    /// Keepalive interval; 90% of `pong_wait`, never below [`MIN_PING_PERIOD`].
    pub ping_period: Duration,
}

impl PumpSettings {
    pub fn new(max_message_size: usize, pong_wait: Duration, write_wait: Duration) -> Self {
        Self {
            max_message_size,
            pong_wait,
            write_wait,
            ping_period: pong_wait.mul_f64(0.9).max(MIN_PING_PERIOD),
        }
    }
}

impl From<&HubSettings> for PumpSettings {
    fn from(settings: &HubSettings) -> Self {
        Self::new(
            settings.max_message_size,
            Duration::from_secs(settings.pong_wait_secs),
            Duration::from_secs(settings.write_wait_secs),
        )
    }
}

/// Consume inbound frames until the viewer goes away, then unregister.
///
/// Inbound traffic is only used for liveness; pings are answered by the
/// WebSocket layer and any other frame simply renews the read deadline.
pub async fn read_pump<R, E>(hub: Arc<Hub>, conn: Arc<Connection>, mut stream: R, settings: PumpSettings)
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    loop {
        let next = match timeout(settings.pong_wait, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                debug!(conn = %conn.id(), "read deadline expired");
                break;
            }
        };

        match next {
            Some(Ok(msg)) => {
                if msg.len() > settings.max_message_size {
                    warn!(
                        conn = %conn.id(),
                        size = msg.len(),
                        limit = settings.max_message_size,
                        "inbound frame too large"
                    );
                    break;
                }
                conn.touch();
                if msg.is_close() {
                    debug!(conn = %conn.id(), "viewer sent close");
                    break;
                }
            }
            Some(Err(e)) => {
                debug!(conn = %conn.id(), error = %e, "read failed");
                break;
            }
            None => break,
        }
    }

    hub.unregister(&conn);
}

/// Drain the outbound queue to the socket and keep the peer alive with pings.
///
/// Ends when the queue is closed (after sending a close frame) or when a
/// write fails or exceeds the write deadline (after unregistering).
pub async fn write_pump<S>(
    hub: Arc<Hub>,
    conn: Arc<Connection>,
    mut queue: mpsc::Receiver<WsMessage>,
    mut sink: S,
    settings: PumpSettings,
) where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    loop {
        let frame = tokio::select! {
            queued = queue.recv() => match queued {
                Some(msg) => msg,
                None => {
                    let _ = timeout(settings.write_wait, sink.send(conn.close_frame())).await;
                    debug!(conn = %conn.id(), evicted = conn.was_evicted(), "send loop closed");
                    return;
                }
            },
            _ = ticker.tick() => WsMessage::Ping(Default::default()),
        };

        match timeout(settings.write_wait, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(conn = %conn.id(), error = %e, "write failed");
                break;
            }
            Err(_) => {
                debug!(conn = %conn.id(), "write deadline expired");
                break;
            }
        }
    }

    hub.unregister(&conn);
    let _ = timeout(settings.write_wait, sink.close()).await;
}
