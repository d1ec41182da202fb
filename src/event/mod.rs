//! Event definitions shared by the publisher, the bridge and the hub.
//!
//! An [`Event`] is the canonical wire and internal representation of a live
//! match update. On the wire it is a JSON envelope:
//!
//! ```json
//! { "type": "match_event", "match_id": 42, "timestamp": 1725000000000, "data": { ... } }
//! ```
//!
//! The `type` tag selects the shape of `data`. The same envelope is used on the
//! pub/sub channel and on the viewer socket, so nothing between the publisher
//! and the viewer needs to know which kind of update it is carrying.
//!
//! Notes on fields:
//! - `match_id`: positive integer, the fan-out partition key
//! - `timestamp`: milliseconds since UNIX epoch; assigned once by the
//!   publisher and never changed afterwards

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;


/// Identifier of a match. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct MatchId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid match id: {0}")]
pub struct InvalidMatchId(pub String);

impl MatchId {
    pub fn new(raw: u64) -> Result<Self, InvalidMatchId> {
        if raw == 0 {
            return Err(InvalidMatchId(raw.to_string()));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for MatchId {
    type Error = InvalidMatchId;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<MatchId> for u64 {
    fn from(id: MatchId) -> Self {
        id.0
    }
}

impl FromStr for MatchId {
    type Err = InvalidMatchId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map_err(|_| InvalidMatchId(s.to_string()))
            .and_then(Self::new)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of on-pitch incident carried by a `match_event`.
///
/// Incidents this crate does not know about decode to [`MatchEventKind::Other`]
/// and keep their original name, so relaying them never rewrites the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchEventKind {
    Goal,
    OwnGoal,
    Penalty,
    Shot,
    ShotOnTarget,
    Corner,
    Foul,
    Offside,
    YellowCard,
    RedCard,
    Substitution,
    Other(String),
}

impl MatchEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            MatchEventKind::Goal => "goal",
            MatchEventKind::OwnGoal => "own_goal",
            MatchEventKind::Penalty => "penalty",
            MatchEventKind::Shot => "shot",
            MatchEventKind::ShotOnTarget => "shot_on_target",
            MatchEventKind::Corner => "corner",
            MatchEventKind::Foul => "foul",
            MatchEventKind::Offside => "offside",
            MatchEventKind::YellowCard => "yellow_card",
            MatchEventKind::RedCard => "red_card",
            MatchEventKind::Substitution => "substitution",
            MatchEventKind::Other(name) => name,
        }
    }
}

impl From<String> for MatchEventKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "goal" => MatchEventKind::Goal,
            "own_goal" => MatchEventKind::OwnGoal,
            "penalty" => MatchEventKind::Penalty,
            "shot" => MatchEventKind::Shot,
            "shot_on_target" => MatchEventKind::ShotOnTarget,
            "corner" => MatchEventKind::Corner,
            "foul" => MatchEventKind::Foul,
            "offside" => MatchEventKind::Offside,
            "yellow_card" => MatchEventKind::YellowCard,
            "red_card" => MatchEventKind::RedCard,
            "substitution" => MatchEventKind::Substitution,
            _ => MatchEventKind::Other(name),
        }
    }
}

impl From<MatchEventKind> for String {
    fn from(kind: MatchEventKind) -> Self {
        match kind {
            MatchEventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pitch coordinates in percent of length/width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEventData {
    pub event_type: MatchEventKind,
    pub minute: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl MatchEventData {
    pub fn new(event_type: MatchEventKind, minute: u16) -> Self {
        Self {
            event_type,
            minute,
            player_id: None,
            team_id: None,
            position: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreData {
    pub home_score: u16,
    pub away_score: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Live,
    HalfTime,
    Finished,
    Postponed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusData {
    pub status: MatchStatus,
}

/// Type-specific body of an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    MatchEvent(MatchEventData),
    ScoreUpdate(ScoreData),
    MatchStatus(StatusData),
}

impl EventData {
    /// The envelope `type` tag for this body.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventData::MatchEvent(_) => "match_event",
            EventData::ScoreUpdate(_) => "score_update",
            EventData::MatchStatus(_) => "match_status",
        }
    }

    /// The body alone, as it appears under `data` on the wire.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            EventData::MatchEvent(d) => serde_json::to_value(d),
            EventData::ScoreUpdate(d) => serde_json::to_value(d),
            EventData::MatchStatus(d) => serde_json::to_value(d),
        }
    }
}

/// A live update for exactly one match.
///
/// Fields are private so the timestamp cannot be changed once the event
/// exists; construct through [`Event::new`] or by decoding an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Envelope", into = "Envelope")]
pub struct Event {
    match_id: MatchId,
    timestamp: i64,
    data: EventData,
}

impl Event {
    pub fn new(match_id: MatchId, timestamp: i64, data: EventData) -> Self {
        Self {
            match_id,
            timestamp,
            data,
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn type_tag(&self) -> &'static str {
        self.data.type_tag()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Wire form of [`Event`]: an internally tagged enum keeps the `type` tag next
/// to the shared `match_id`/`timestamp` fields.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    MatchEvent {
        match_id: MatchId,
        timestamp: i64,
        data: MatchEventData,
    },
    ScoreUpdate {
        match_id: MatchId,
        timestamp: i64,
        data: ScoreData,
    },
    MatchStatus {
        match_id: MatchId,
        timestamp: i64,
        data: StatusData,
    },
}

impl From<Envelope> for Event {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::MatchEvent {
                match_id,
                timestamp,
                data,
            } => Event::new(match_id, timestamp, EventData::MatchEvent(data)),
            Envelope::ScoreUpdate {
                match_id,
                timestamp,
                data,
            } => Event::new(match_id, timestamp, EventData::ScoreUpdate(data)),
            Envelope::MatchStatus {
                match_id,
                timestamp,
                data,
            } => Event::new(match_id, timestamp, EventData::MatchStatus(data)),
        }
    }
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        let Event {
            match_id,
            timestamp,
            data,
        } = event;
        match data {
            EventData::MatchEvent(data) => Envelope::MatchEvent {
                match_id,
                timestamp,
                data,
            },
            EventData::ScoreUpdate(data) => Envelope::ScoreUpdate {
                match_id,
                timestamp,
                data,
            },
            EventData::MatchStatus(data) => Envelope::MatchStatus {
                match_id,
                timestamp,
                data,
            },
        }
    }
}
