//! # dis-rs
//!
//! A live discursive-image feed: timed word/image records come in on one
//! side, every connected WebSocket subscriber sees each decoded event on the
//! other, and subscribers report back what is on screen so an external
//! audio controller can follow along.
//!
//! ```text
//!   records ──► decode ──► fetch once ──► Hub ──► mailbox ──► pump ──► subscriber
//!                                                              │
//!   audio controller ◄── OSC/UDP ◄── ControlRelay ◄────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dis_rs::fetch::{DirStorage, FetchCache, FetchConfig, HttpRetriever};
//! use dis_rs::hub::Hub;
//! use dis_rs::pipeline::{Ingestor, InputSource, PipelineConfig, Supervisor};
//! use dis_rs::record::RecordDecoder;
//! use dis_rs::relay::{ControlRelay, UdpControlSender};
//! use dis_rs::server::{DisServer, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let hub = Arc::new(Hub::new());
//! let storage = Arc::new(DirStorage::open_dir("images").await?);
//! let relay = ControlRelay::new(Arc::new(UdpControlSender::connect("localhost", 5498).await?));
//!
//! let server = Arc::new(DisServer::new(
//!     ServerConfig::default(),
//!     Arc::clone(&hub),
//!     relay,
//!     storage.clone(),
//! ));
//! let ingestor = Ingestor::new(
//!     RecordDecoder::new(config.mapping).scheme(config.scheme),
//!     FetchCache::new(storage, Arc::new(HttpRetriever::new(&FetchConfig::default())?)),
//!     hub,
//! );
//!
//! let (_interrupts, rx) = tokio::sync::mpsc::channel(1);
//! Supervisor::new(config, server, ingestor)
//!     .run(InputSource::Stdin, rx)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fetch;
pub mod hub;
pub mod pipeline;
pub mod record;
pub mod relay;
pub mod replay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use hub::Hub;
pub use pipeline::{PipelineConfig, Supervisor};
pub use record::Event;
pub use server::{DisServer, ServerConfig};
