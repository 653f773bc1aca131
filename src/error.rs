//! Error types
//!
//! Errors are grouped by how far they are allowed to travel:
//!
//! - [`DecodeError`] and [`FetchError`] are per-record. The ingestion loop logs
//!   them and moves on to the next record.
//! - [`ConnectionError`] is per-subscriber. It ends that subscriber's pump and
//!   nothing else.
//! - [`RelayError`] and [`ProtocolError`] are per-control-message. They are
//!   reported back to the subscriber that sent the message.
//! - [`InputError`] ends ingestion and starts draining.
//! - [`Error::Listener`] ends the process.
//! - [`WatchError`] belongs to the bundled watch client only.

use std::fmt;
use std::io;

use crate::hub::HubError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("hub error: {0}")]
    Hub(#[from] HubError),

    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("listener error: {0}")]
    Listener(#[source] io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] WatchError),
}

/// Which timing column a duration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationField {
    Start,
    End,
}

impl fmt::Display for DurationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationField::Start => f.write_str("start"),
            DurationField::End => f.write_str("end"),
        }
    }
}

/// Rejections of an `HH:MM:SS.mmm` offset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("missing '.' between seconds and milliseconds in {0:?}")]
    MissingFraction(String),

    #[error("expected hh:mm:ss before the fraction, found {0:?}")]
    Units(String),

    #[error("component {position} has {found} digits, expected 2")]
    UnitDigits { position: usize, found: usize },

    #[error("millisecond fraction has {0} digits, expected 3")]
    MillisDigits(usize),

    #[error("component {0:?} is not a number")]
    NotNumeric(String),

    #[error("minutes must be at most 59, found {0}")]
    Minutes(u64),

    #[error("seconds must be at most 59, found {0}")]
    Seconds(u64),
}

/// Per-record decode rejections
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("record has {len} fields, need at least {need}")]
    Schema { len: usize, need: usize },

    #[error("field {position} is not an absolute uri: {source}")]
    Uri {
        position: usize,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid {field} offset: {source}")]
    DurationFormat {
        field: DurationField,
        #[source]
        source: DurationError,
    },
}

/// Per-record media retrieval failures
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unable to prepare storage for {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to retrieve {link}: {source}")]
    Retrieve {
        link: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("retrieving {link} answered with status {status}")]
    Status { link: String, status: u16 },

    #[error("unable to store {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Control relay failures
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("unable to send {address} to control endpoint: {source}")]
    Send {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("control endpoint {0} did not resolve")]
    Unresolved(String),
}

/// Malformed or unknown client control messages
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("undefined event type {0:?}")]
    UnknownKind(String),

    #[error("on-screen event without a file_name")]
    MissingFileName,

    #[error("malformed client event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("binary frames are not accepted")]
    Binary,
}

/// Fatal per-subscriber failures
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),

    #[error("no keepalive acknowledgement within {0:?}")]
    Liveness(std::time::Duration),

    #[error("transport: {0}")]
    Transport(#[from] axum::Error),

    #[error("unable to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures reading the record stream
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("unable to open input {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to read from input: {0}")]
    Read(#[from] csv::Error),

    #[error("unable to start input reader: {0}")]
    Spawn(#[source] io::Error),
}

/// Failures of the watch client
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("unable to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    #[error("connection is gone")]
    Disconnected,

    #[error("unable to encode signal: {0}")]
    Encode(#[from] serde_json::Error),
}
