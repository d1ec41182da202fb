//! The `connection` module defines one live viewer of a match.
//!
//! It provides the [`Connection`] handle that the hub registers and fans out
//! to, and the read/write pumps that move frames between the handle's bounded
//! outbound queue and the viewer's socket.

pub mod handle;
pub mod pump;

pub use handle::{Connection, ConnectionId, EnqueueError};
pub use pump::{PumpSettings, read_pump, write_pump};
