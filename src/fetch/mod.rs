//! Fetch/dedup cache
//!
//! Every decoded event names its media by content key. Before an event is
//! published the cache makes sure that key is present in storage, retrieving
//! the link at most once per key.
//!
//! ```text
//!   Event ──► storage.exists(key)? ──yes──► Hit
//!                   │
//!                   no
//!                   ▼
//!             storage.create(key) ──► sink
//!             retriever.retrieve(link) ──► chunks ──► sink
//!                   │
//!                   ▼
//!             Downloaded(bytes)
//! ```
//!
//! Both collaborators are traits so tests can substitute in-memory fakes.

pub mod cache;
pub mod config;
pub mod retriever;
pub mod storage;

pub use cache::{CacheOutcome, FetchCache};
pub use config::FetchConfig;
pub use retriever::{ByteStream, HttpRetriever, Retriever};
pub use storage::{DirStorage, MemoryStorage, Sink, Source, Storage};
