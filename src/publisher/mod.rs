//! Write side of the live feed.
//!
//! [`EventPublisher`] turns a new domain event into a durable log entry and,
//! only once that append succeeded, a live notification on the match's
//! pub/sub channel. An event that was not recorded is never announced.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::{info, warn};

use crate::event::{Event, EventData, MatchEventData, MatchId, MatchStatus, ScoreData, StatusData};
use crate::persistence::{CacheStore, EventLog, LogEntry};
use crate::pubsub::{self, PubSub};
use crate::utils::error::{CacheError, PublishError};

/// Suffixes of the cached per-match views dropped on invalidation.
pub const CACHED_VIEWS: [&str; 3] = ["summary", "events", "stats"];

pub struct EventPublisher {
    log: Arc<dyn EventLog>,
    pubsub: Arc<dyn PubSub>,
    cache: Arc<dyn CacheStore>,
    channel_prefix: String,
    /// Highest timestamp handed out so far, in milliseconds.
    last_timestamp: AtomicI64,
}

impl EventPublisher {
    pub fn new(
        log: Arc<dyn EventLog>,
        pubsub: Arc<dyn PubSub>,
        cache: Arc<dyn CacheStore>,
        channel_prefix: impl Into<String>,
    ) -> Self {
        Self {
            log,
            pubsub,
            cache,
            channel_prefix: channel_prefix.into(),
            last_timestamp: AtomicI64::new(i64::MIN),
        }
    }

    /// Current wall clock, never earlier than a timestamp already issued.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.last_timestamp.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }

    /// Record `data` for `match_id` and announce it to live viewers.
    pub async fn publish(&self, match_id: MatchId, data: EventData) -> Result<Event, PublishError> {
        let event = Event::new(match_id, self.next_timestamp(), data);

        let entry = LogEntry {
            event_type: event.type_tag().to_string(),
            payload: event.data().to_value()?,
            timestamp: event.timestamp(),
        };
        let position = self.log.append(match_id, &entry).await.map_err(|e| {
            warn!(
                match_id = %match_id,
                kind = event.type_tag(),
                error = %e,
                "durable append failed, not publishing"
            );
            PublishError::Append(e)
        })?;

        let channel = pubsub::channel_for(&self.channel_prefix, match_id);
        let payload = event.to_json()?;
        let receivers = self
            .pubsub
            .publish(&channel, &payload)
            .await
            .map_err(|e| {
                warn!(match_id = %match_id, channel = %channel, error = %e, "live publish failed");
                PublishError::Broker(e)
            })?;

        info!(
            match_id = %match_id,
            kind = event.type_tag(),
            position,
            receivers,
            "event published"
        );
        Ok(event)
    }

    pub async fn publish_match_event(
        &self,
        match_id: MatchId,
        data: MatchEventData,
    ) -> Result<Event, PublishError> {
        self.publish(match_id, EventData::MatchEvent(data)).await
    }

    pub async fn publish_score_update(
        &self,
        match_id: MatchId,
        home_score: u16,
        away_score: u16,
    ) -> Result<Event, PublishError> {
        self.publish(
            match_id,
            EventData::ScoreUpdate(ScoreData {
                home_score,
                away_score,
            }),
        )
        .await
    }

    pub async fn publish_match_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
    ) -> Result<Event, PublishError> {
        self.publish(match_id, EventData::MatchStatus(StatusData { status }))
            .await
    }

    /// Drop every cached view of a match.
    ///
    /// Best effort: each key is attempted regardless of earlier failures and
    /// its outcome is reported; `Ok(false)` means the key was not cached.
    pub async fn invalidate_match_cache(
        &self,
        match_id: MatchId,
    ) -> Vec<(String, Result<bool, CacheError>)> {
        let mut outcomes = Vec::with_capacity(CACHED_VIEWS.len());
        for key in cache_keys(match_id) {
            let outcome = self.cache.delete(&key).await;
            if let Err(e) = &outcome {
                warn!(match_id = %match_id, key = %key, error = %e, "cache invalidation failed");
            }
            outcomes.push((key, outcome));
        }
        outcomes
    }
}

/// Cache keys of the derived views for a match.
pub fn cache_keys(match_id: MatchId) -> Vec<String> {
    CACHED_VIEWS
        .iter()
        .map(|view| format!("match:{match_id}:{view}"))
        .collect()
}
