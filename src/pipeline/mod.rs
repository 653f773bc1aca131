//! Ingestion-to-broadcast pipeline
//!
//! ```text
//!   input ──► RecordStream ──► Ingestor ─────────────────────────► Hub
//!   (csv)      (thread)         decode ──► FetchCache::ensure ──► publish
//!                                  │              │
//!                               rejected     fetch failed      (logged, skipped)
//! ```
//!
//! The [`Supervisor`] owns the lifecycle around it: it binds the listener,
//! opens the input, runs ingestion, and on completion or interrupt drains
//! for the grace period before closing the hub and joining every pump.

pub mod config;
pub mod ingest;
pub mod input;
pub mod supervisor;

pub use config::PipelineConfig;
pub use ingest::{Ended, Ingestor, RecordOutcome};
pub use input::{InputSource, RecordResult, RecordStream};
pub use supervisor::{DrainReason, PipelinePhase, Shutdown, Supervisor};
