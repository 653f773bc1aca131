//! Statistics and metrics for the pipeline, the server and each subscriber

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-subscriber counters, shared by the pump's two loops
#[derive(Debug, Default)]
pub struct SessionCounters {
    events_sent: AtomicU64,
    pings_sent: AtomicU64,
    signals_relayed: AtomicU64,
    protocol_errors: AtomicU64,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ping_sent(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signal_relayed(&self) {
        self.signals_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot for a session that has been open for `duration`
    pub fn snapshot(&self, duration: Duration) -> SessionStats {
        SessionStats {
            events_sent: self.events_sent.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            signals_relayed: self.signals_relayed.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            duration,
        }
    }
}

/// Session-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Events written to the subscriber
    pub events_sent: u64,
    /// Keepalive probes written
    pub pings_sent: u64,
    /// Control signals forwarded to the relay
    pub signals_relayed: u64,
    /// Error replies sent for bad control messages
    pub protocol_errors: u64,
    /// Connection duration
    pub duration: Duration,
}

/// Ingestion counters
#[derive(Debug, Default)]
pub struct PipelineStats {
    records: AtomicU64,
    rejected: AtomicU64,
    fetch_failures: AtomicU64,
    cache_hits: AtomicU64,
    downloads: AtomicU64,
    bytes_downloaded: AtomicU64,
    published: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn downloaded(&self, bytes: u64) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn event_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            records: self.records.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    /// Records read from the input
    pub records: u64,
    /// Records that failed to decode
    pub rejected: u64,
    /// Events dropped because their media could not be stored
    pub fetch_failures: u64,
    /// Events whose media was already stored
    pub cache_hits: u64,
    /// Media retrievals
    pub downloads: u64,
    /// Bytes written by retrievals
    pub bytes_downloaded: u64,
    /// Events handed to the hub
    pub published: u64,
}

/// Subscriber connection counters
#[derive(Debug, Default)]
pub struct ServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Total connections ever accepted
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Connections currently open
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Upgrades refused because of the connection limit
    pub fn rejected_connections(&self) -> u64 {
        self.rejected_connections.load(Ordering::Relaxed)
    }
}
