//! The `pubsub` module is the seam to the live pub/sub broker.
//!
//! Events for a match travel on a channel named `{prefix}:{match_id}`. The
//! bridge listens to all of them through one pattern subscription,
//! `{prefix}:*`, so the number of live matches never changes the number of
//! broker subscriptions.
//!
//! [`LocalPubSub`] is an in-process implementation used by the server binary
//! and the tests. Delivery is at-most-once: a message published while nobody
//! is subscribed is gone.

pub mod local;
pub mod pattern;

use async_trait::async_trait;

use crate::event::MatchId;
use crate::utils::error::BrokerError;

pub use local::LocalPubSub;
pub use pattern::pattern_matches;

pub const DEFAULT_CHANNEL_PREFIX: &str = "match";

/// A message delivered to a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Pattern of the subscription that matched.
    pub pattern: String,
    /// Concrete channel the message was published on.
    pub channel: String,
    pub payload: String,
}

#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publish `payload` on `channel`. Returns how many subscriptions matched.
    async fn publish(&self, channel: &str, payload: &str) -> Result<usize, BrokerError>;

    /// Open a subscription receiving every channel matching `pattern`.
    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, BrokerError>;
}

#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message. Errors are transient unless
    /// [`BrokerError::needs_resubscribe`] says otherwise.
    async fn recv(&mut self) -> Result<BrokerMessage, BrokerError>;
}

/// Channel carrying the events of one match.
pub fn channel_for(prefix: &str, match_id: MatchId) -> String {
    format!("{prefix}:{match_id}")
}

/// Pattern covering the channels of every match.
pub fn all_matches_pattern(prefix: &str) -> String {
    format!("{prefix}:*")
}

/// Recover the match id from a channel name produced by [`channel_for`].
pub fn match_id_from_channel(prefix: &str, channel: &str) -> Option<MatchId> {
    channel
        .strip_prefix(prefix)?
        .strip_prefix(':')?
        .parse()
        .ok()
}
