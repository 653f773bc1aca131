//! Paced replay of captured records
//!
//! Each record carries the offset at which it was originally written. Replay
//! re-emits it once that much time has passed since the start, so a capture
//! can be fed back into `dis serve` at its original pace.

use std::io::Write;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::InputError;
use crate::pipeline::RecordStream;
use crate::record::parse_offset;

/// Replay options
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Column holding the offset
    pub at_column: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { at_column: 0 }
    }
}

impl ReplayConfig {
    /// Set the offset column
    pub fn at_column(mut self, column: usize) -> Self {
        self.at_column = column;
        self
    }
}

/// Replay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub written: u64,
    pub skipped: u64,
}

/// Replay `records` into `out`, pacing by the offset column
pub async fn replay<W: Write>(
    config: ReplayConfig,
    mut records: RecordStream,
    out: W,
) -> Result<ReplayStats, InputError> {
    let start = Instant::now();
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
    let mut stats = ReplayStats::default();

    while let Some(record) = records.next().await {
        let record = record?;

        let at = match offset(&record, config.at_column) {
            Ok(at) => at,
            Err(reason) => {
                stats.skipped += 1;
                tracing::warn!(record = ?record, reason = %reason, "Record skipped");
                continue;
            }
        };

        tokio::time::sleep_until(start + at).await;
        writer.write_record(&record)?;
        writer.flush().map_err(csv::Error::from)?;
        stats.written += 1;
    }

    Ok(stats)
}

fn offset(record: &[String], column: usize) -> Result<Duration, String> {
    let raw = record
        .get(column)
        .ok_or_else(|| format!("no column {}", column))?;
    parse_offset(raw).map_err(|e| e.to_string())
}
