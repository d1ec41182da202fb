//! The `hub` module is the single authority over who is watching which match.
//!
//! It owns the registry (match id → set of connections) and fans each event
//! out to the connections of its match. Nothing outside the hub touches the
//! registry directly; connections come and go through `register` and
//! `unregister`.

pub mod engine;
pub mod subscribers;

pub use engine::{BroadcastReport, Hub};

#[cfg(test)]
mod tests;
