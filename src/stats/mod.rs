//! Counters for ingestion, connections and individual subscribers

pub mod metrics;

pub use metrics::{PipelineSnapshot, PipelineStats, ServerStats, SessionCounters, SessionStats};
