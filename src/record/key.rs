//! Content keys
//!
//! A content key names a piece of media both in the dedup check and on disk.
//! It is derived from the link (and, depending on the scheme, the word) so the
//! same pair always lands on the same file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters left alone when escaping a key; everything else is encoded.
pub const KEY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// How the content key is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyScheme {
    /// `md5(link ++ word)` in hex, followed by the link's extension
    #[default]
    LinkAndLabel,
    /// `word-md5(link)` followed by the link's extension
    LabelledLink,
}

impl KeyScheme {
    /// Derive the escaped content key
    ///
    /// The digest covers the serialized URL, which is also what goes out as
    /// the event's link, so a client can recompute the key.
    pub fn content_key(&self, link: &Url, word: &str) -> String {
        let ext = extension(link);
        let key = match self {
            KeyScheme::LinkAndLabel => {
                let mut ctx = md5::Context::new();
                ctx.consume(link.as_str().as_bytes());
                ctx.consume(word.as_bytes());
                format!("{:x}{}", ctx.compute(), ext)
            }
            KeyScheme::LabelledLink => {
                format!("{}-{:x}{}", word, md5::compute(link.as_str().as_bytes()), ext)
            }
        };
        escape(&key)
    }

    /// Name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyScheme::LinkAndLabel => "link-and-label",
            KeyScheme::LabelledLink => "labelled-link",
        }
    }
}

impl fmt::Display for KeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link-and-label" => Ok(KeyScheme::LinkAndLabel),
            "labelled-link" => Ok(KeyScheme::LabelledLink),
            other => Err(format!(
                "unknown key scheme {:?} (expected link-and-label or labelled-link)",
                other
            )),
        }
    }
}

/// Escape a string into a single safe path segment
pub fn escape(raw: &str) -> String {
    utf8_percent_encode(raw, KEY_ESCAPE).to_string()
}

/// Extension of the link's path including the leading dot, or empty
fn extension(link: &Url) -> String {
    Path::new(link.path())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}
