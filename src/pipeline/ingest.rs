//! Ingestion: record → decode → fetch → publish
//!
//! Runs on a single task so events reach the hub in input order and the
//! fetch cache never sees two concurrent `ensure` calls.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::input::RecordStream;
use crate::error::InputError;
use crate::fetch::{CacheOutcome, FetchCache};
use crate::hub::Hub;
use crate::record::RecordDecoder;
use crate::stats::PipelineStats;

/// What became of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Published to this many subscribers
    Published(usize),
    /// Failed to decode
    Rejected,
    /// Media could not be stored
    FetchFailed,
    /// The hub no longer accepts events
    HubClosed,
}

/// Why ingestion stopped without an input error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ended {
    /// The input had no more records
    Exhausted,
    /// Shutdown was requested
    Cancelled,
}

pub struct Ingestor {
    decoder: RecordDecoder,
    cache: FetchCache,
    hub: Arc<Hub>,
    stats: Arc<PipelineStats>,
}

impl Ingestor {
    pub fn new(decoder: RecordDecoder, cache: FetchCache, hub: Arc<Hub>) -> Self {
        Self {
            decoder,
            cache,
            hub,
            stats: Arc::new(PipelineStats::new()),
        }
    }

    /// Ingestion counters
    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Take one record through the pipeline
    ///
    /// Per-record failures are logged and counted, never returned.
    pub async fn handle_record(&self, line: u64, record: &[String]) -> RecordOutcome {
        self.stats.record_read();

        let event = match self.decoder.decode(record) {
            Ok(event) => event,
            Err(e) => {
                self.stats.record_rejected();
                tracing::warn!(line = line, error = %e, "Record rejected");
                return RecordOutcome::Rejected;
            }
        };

        match self.cache.ensure(&event).await {
            Ok(CacheOutcome::Hit) => self.stats.cache_hit(),
            Ok(CacheOutcome::Downloaded(bytes)) => {
                self.stats.downloaded(bytes);
                tracing::debug!(key = %event.file_name, bytes = bytes, "Media stored");
            }
            Err(e) => {
                self.stats.fetch_failed();
                tracing::warn!(line = line, link = %event.link, error = %e, "Unable to fetch media");
                return RecordOutcome::FetchFailed;
            }
        }

        let word = event.word.clone();
        match self.hub.publish(event).await {
            Ok(delivered) => {
                self.stats.event_published();
                tracing::debug!(line = line, word = %word, subscribers = delivered, "Event published");
                RecordOutcome::Published(delivered)
            }
            Err(e) => {
                tracing::debug!(line = line, error = %e, "Event not published");
                RecordOutcome::HubClosed
            }
        }
    }

    /// Ingest until the input ends, fails, or `cancel` fires
    pub async fn run(
        &self,
        input: &mut RecordStream,
        cancel: CancellationToken,
    ) -> Result<Ended, InputError> {
        let mut line = 0u64;

        loop {
            let record = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Ended::Cancelled),
                record = input.next() => record,
            };

            let record = match record {
                Some(record) => record?,
                None => return Ok(Ended::Exhausted),
            };
            line += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Ended::Cancelled),
                outcome = self.handle_record(line, &record) => outcome,
            };
            if outcome == RecordOutcome::HubClosed {
                return Ok(Ended::Cancelled);
            }
        }
    }
}
