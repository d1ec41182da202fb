//! Broker bridge
//!
//! Feeds the hub from the pub/sub broker. One pattern subscription covers the
//! channels of every match; each message is decoded and forwarded to the
//! hub's intake in the order it was received.
//!
//! Failure handling:
//! - a payload that does not decode (or whose match id disagrees with its
//!   channel) is logged and skipped
//! - a receive error is logged, followed by a fixed backoff and another
//!   attempt; if the broker reports the subscription as gone it is
//!   re-established first
//! - the loop only ends on shutdown, or when the hub intake is gone

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::event::Event;
use crate::pubsub::{self, BrokerMessage, PubSub, Subscription};
use crate::utils::shutdown;

pub struct BrokerBridge {
    pubsub: Arc<dyn PubSub>,
    intake: mpsc::Sender<Event>,
    channel_prefix: String,
    retry_backoff: Duration,
}

/// What to do after handling one broker message.
enum Flow {
    Continue,
    Stop,
}

impl BrokerBridge {
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

    pub fn new(
        pubsub: Arc<dyn PubSub>,
        intake: mpsc::Sender<Event>,
        channel_prefix: impl Into<String>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            pubsub,
            intake,
            channel_prefix: channel_prefix.into(),
            retry_backoff,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let pattern = pubsub::all_matches_pattern(&self.channel_prefix);
        let mut subscription: Option<Box<dyn Subscription>> = None;

        info!(pattern = %pattern, "broker bridge started");
        while !shutdown::is_signalled(&shutdown_rx) {
            if subscription.is_none() {
                match self.pubsub.psubscribe(&pattern).await {
                    Ok(sub) => {
                        info!(pattern = %pattern, "subscribed to match channels");
                        subscription = Some(sub);
                    }
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "subscribe failed, retrying");
                        if self.backoff(&mut shutdown_rx).await {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(sub) = subscription.as_mut() else {
                continue;
            };

            let received = tokio::select! {
                _ = shutdown::signalled(&mut shutdown_rx) => break,
                received = sub.recv() => received,
            };

            match received {
                Ok(msg) => {
                    if let Flow::Stop = self.forward(msg, &mut shutdown_rx).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        backoff_ms = self.retry_backoff.as_millis() as u64,
                        "broker receive failed, retrying"
                    );
                    if e.needs_resubscribe() {
                        subscription = None;
                    }
                    if self.backoff(&mut shutdown_rx).await {
                        break;
                    }
                }
            }
        }
        info!("broker bridge stopped");
    }

    /// Decode one message and hand it to the hub.
    async fn forward(&self, msg: BrokerMessage, shutdown_rx: &mut watch::Receiver<bool>) -> Flow {
        let event = match Event::from_json(&msg.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(channel = %msg.channel, error = %e, "dropping malformed broker message");
                return Flow::Continue;
            }
        };

        let channel_match = pubsub::match_id_from_channel(&self.channel_prefix, &msg.channel);
        if channel_match != Some(event.match_id()) {
            warn!(
                channel = %msg.channel,
                match_id = %event.match_id(),
                "dropping event published on another match's channel"
            );
            return Flow::Continue;
        }

        debug!(match_id = %event.match_id(), kind = event.type_tag(), "forwarding event to hub");
        tokio::select! {
            _ = shutdown::signalled(shutdown_rx) => Flow::Stop,
            sent = self.intake.send(event) => match sent {
                Ok(()) => Flow::Continue,
                Err(_) => {
                    warn!("hub intake closed");
                    Flow::Stop
                }
            },
        }
    }

    /// Sleep for the retry backoff. Returns `true` if shutdown arrived first.
    async fn backoff(&self, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = shutdown::signalled(shutdown_rx) => true,
            _ = tokio::time::sleep(self.retry_backoff) => false,
        }
    }
}

#[cfg(test)]
mod tests;
