//! The `utils` module provides the ambient pieces shared across `livefeed`:
//! error types, logging setup and the shutdown signal helper.

pub mod error;
pub mod logging;
pub mod shutdown;
