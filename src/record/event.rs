//! Decoded event
//!
//! An [`Event`] associates a spoken word with the image that illustrates it.
//! Once decoded it never changes; the hub shares it between subscribers
//! behind an `Arc`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// A decoded discursive image
///
/// The serialized field names are the contract subscribers parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Source of the image
    pub link: Url,
    /// Spoken word or phrase
    pub word: String,
    /// Human-readable caption shown next to the image
    pub caption: String,
    /// Content key, also the stored file name
    pub file_name: String,
    /// Offset at which the word starts
    #[serde(with = "millis")]
    pub start_at: Duration,
    /// Offset at which the word ends
    #[serde(with = "millis")]
    pub end_at: Duration,
}

impl Event {
    /// Content key used for dedup and storage
    pub fn content_key(&self) -> &str {
        &self.file_name
    }
}

/// Caption text for a word heard at `at`
pub fn caption(word: &str, at: Duration) -> String {
    format!("\"{}\", heard after {}", word, humantime::format_duration(at))
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
