//! In-process pub/sub broker.
//!
//! Uses a single `tokio::sync::broadcast` channel as the bus. Each pattern
//! subscription holds its own receiver and filters messages locally, which
//! mirrors how a pattern subscription on an external broker behaves. A
//! subscription that falls more than `capacity` messages behind sees
//! [`BrokerError::Lagged`] and resumes from the oldest retained message.

use std::sync::{Arc, PoisonError, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::pubsub::{BrokerMessage, PubSub, Subscription, pattern_matches};
use crate::utils::error::BrokerError;

/// Capacity of the bus. Slow subscriptions that fall behind skip messages.
pub const DEFAULT_BUS_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
struct Published {
    channel: Arc<str>,
    payload: Arc<str>,
}

/// Cloneable handle; all clones share the same bus.
#[derive(Debug, Clone)]
pub struct LocalPubSub {
    bus: broadcast::Sender<Published>,
    patterns: Arc<RwLock<Vec<(usize, String)>>>,
    next_subscription: Arc<AtomicUsize>,
}

impl Default for LocalPubSub {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl LocalPubSub {
    pub fn new(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity.max(1));
        Self {
            bus,
            patterns: Arc::default(),
            next_subscription: Arc::default(),
        }
    }

    /// Number of live pattern subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn matching_subscriptions(&self, channel: &str) -> usize {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, pattern)| pattern_matches(pattern, channel))
            .count()
    }
}

#[async_trait]
impl PubSub for LocalPubSub {
    async fn publish(&self, channel: &str, payload: &str) -> Result<usize, BrokerError> {
        let receivers = self.matching_subscriptions(channel);
        // send() only fails when nobody is subscribed; at-most-once means
        // that message is simply gone.
        let _ = self.bus.send(Published {
            channel: channel.into(),
            payload: payload.into(),
        });
        Ok(receivers)
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, pattern.to_string()));

        Ok(Box::new(LocalSubscription {
            id,
            pattern: pattern.to_string(),
            receiver: self.bus.subscribe(),
            patterns: Arc::clone(&self.patterns),
        }))
    }
}

struct LocalSubscription {
    id: usize,
    pattern: String,
    receiver: broadcast::Receiver<Published>,
    patterns: Arc<RwLock<Vec<(usize, String)>>>,
}

#[async_trait]
impl Subscription for LocalSubscription {
    async fn recv(&mut self) -> Result<BrokerMessage, BrokerError> {
        loop {
            match self.receiver.recv().await {
                Ok(published) if pattern_matches(&self.pattern, &published.channel) => {
                    return Ok(BrokerMessage {
                        pattern: self.pattern.clone(),
                        channel: published.channel.to_string(),
                        payload: published.payload.to_string(),
                    });
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Err(BrokerError::Lagged(skipped)),
                Err(RecvError::Closed) => return Err(BrokerError::Closed),
            }
        }
    }
}

impl Drop for LocalSubscription {
    fn drop(&mut self) {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}
