//! Subscriber hub
//!
//! The hub owns every subscriber mailbox and the last published event. The
//! ingestion task publishes into it; each connection pump drains its own
//! mailbox.
//!
//! # Architecture
//!
//! ```text
//!                              Arc<Hub>
//!                     ┌──────────────────────────┐
//!                     │ registry: HashMap<Key,   │
//!                     │   Slot { mpsc::Sender }  │
//!                     │ >                        │
//!                     │ last_event: Option<Arc>  │
//!                     └────────────┬─────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!    [Ingestion]              [Mailbox]                [Mailbox]
//!    hub.publish()            mailbox.recv()           mailbox.recv()
//!         │                        │                        │
//!         └──► tx.send(Arc<Event>) ──► pump ──► WebSocket text frame
//! ```
//!
//! # Backpressure
//!
//! Mailboxes are bounded and never drop. When a mailbox is full, `publish`
//! waits for that subscriber. A subscriber that stops reading is cut off by
//! its pump's write deadline or liveness timeout; its mailbox is then
//! dropped and the waiting `publish` moves on. A `publish` waiting on a
//! mailbox that is evicted, unsubscribed or closed gives up on it and
//! delivers nothing there.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod store;

pub use config::HubConfig;
pub use error::HubError;
pub use mailbox::{Mailbox, SubscriberKey};
pub use store::{Hub, HubStats};
