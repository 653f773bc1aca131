//! Control relay
//!
//! Subscribers report what they are showing; the relay turns those reports
//! into OSC messages for the external audio controller.
//!
//! ```text
//!   {"type":"on-screen","file_name":"abc.jpg"} ──► max/play "abc.jpg"
//!   {"type":"off-screen"}                      ──► max/stop
//! ```
//!
//! Sending is fire-and-forget. A failed send is reported to the subscriber
//! that asked for it and never retried.

pub mod control;
pub mod osc;
pub mod sender;
pub mod signal;

pub use control::{Ack, ControlRelay, RelayConfig};
pub use osc::{OscArg, OscEncoder, OscMessage};
pub use sender::{ControlSender, UdpControlSender};
pub use signal::{ClientEvent, ControlSignal, ErrorReply};
