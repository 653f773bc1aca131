//! Client side of the feed
//!
//! [`StreamWatcher`] subscribes to a running server, reports every event it
//! receives and can send control signals back.

pub mod watch;

pub use watch::{StreamWatcher, WatchEvent};
