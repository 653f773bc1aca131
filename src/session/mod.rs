//! Subscriber session state
//!
//! ```text
//!   Connected ──subscribe──► Active ──pump ends──► Closing ──unsubscribe──► Closed
//!       │                                            ▲
//!       └──────────── hub closed / refused ──────────┘
//! ```

pub mod context;
pub mod state;

pub use context::SessionContext;
pub use state::{SessionPhase, SessionState};
