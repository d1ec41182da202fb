//! The `transport` module is responsible for the network edge towards
//! viewers, via WebSockets.
//!
//! It parses subscription upgrade requests and runs the accept loop that turns
//! each accepted socket into a registered connection with its two pumps.

pub mod message;
pub mod websocket;

pub use message::{RequestError, SubscriptionRequest};
pub use websocket::{serve, start_websocket_server};
