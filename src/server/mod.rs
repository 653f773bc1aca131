//! Feed server
//!
//! Two routes over one axum router:
//!
//! - `GET /di/stream` upgrades to a WebSocket and runs a [`Connection`] pump
//!   for the subscriber.
//! - `GET /di/images/{key}` streams stored media by content key.
//!
//! Pumps are spawned under a `TaskTracker` so shutdown can wait for every one
//! of them after the hub closes their mailboxes.

pub mod config;
pub mod connection;
pub mod listener;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ServerConfig, MIN_PING_PERIOD};
pub use connection::{Connection, Exit};
pub use listener::{DisServer, IMAGES_PATH, STREAM_PATH};
