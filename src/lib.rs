//! # livefeed
//!
//! `livefeed` pushes live match events (goals, cards, score and status
//! changes) to every viewer watching that match over WebSockets, while keeping
//! a durable per-match log of everything that was published.
//!
//! ## Core Modules
//!
//! - `event`: the match id and the event envelope sent on the wire.
//! - `connection`: one viewer socket, its bounded outbound queue and its
//!   read/write pumps.
//! - `hub`: registry of viewers per match and the fan-out broadcaster.
//! - `bridge`: pattern subscription on the pub/sub broker feeding the hub.
//! - `publisher`: durable append followed by a live publish, plus cache
//!   invalidation.
//! - `pubsub`, `persistence`: the broker, event log and cache seams with
//!   their in-process implementations.
//! - `transport`: the WebSocket listener and subscription endpoint.
//! - `config`: layered configuration loading.
//! - `utils`: error types, logging and the shutdown signal.

pub mod bridge;
pub mod config;
pub mod connection;
pub mod event;
pub mod hub;
pub mod persistence;
pub mod publisher;
pub mod pubsub;
pub mod transport;
pub mod utils;
