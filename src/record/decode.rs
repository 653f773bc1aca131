//! Record decoding
//!
//! Turns one raw input record into an [`Event`] or a [`DecodeError`]. No
//! I/O and no shared state; the same record always decodes the same way.

use url::Url;

use super::duration::parse_offset;
use super::event::{caption, Event};
use super::key::KeyScheme;
use super::mapping::ColumnMapping;
use crate::error::{DecodeError, DurationField};

/// Decodes records with a fixed column mapping and key scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordDecoder {
    mapping: ColumnMapping,
    scheme: KeyScheme,
}

impl RecordDecoder {
    /// Create a decoder for the given mapping, using the default key scheme
    pub fn new(mapping: ColumnMapping) -> Self {
        Self {
            mapping,
            scheme: KeyScheme::default(),
        }
    }

    /// Set the key scheme
    pub fn scheme(mut self, scheme: KeyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Column mapping in use
    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Decode a single record
    pub fn decode<S: AsRef<str>>(&self, record: &[S]) -> Result<Event, DecodeError> {
        decode(record, &self.mapping, self.scheme)
    }
}

/// Decode a single record
///
/// Checks run in order: record length, link, start offset, end offset. The
/// first failure wins.
pub fn decode<S: AsRef<str>>(
    record: &[S],
    mapping: &ColumnMapping,
    scheme: KeyScheme,
) -> Result<Event, DecodeError> {
    if record.len() <= mapping.max() {
        return Err(DecodeError::Schema {
            len: record.len(),
            need: mapping.required_len(),
        });
    }

    let field = |i: usize| record[i].as_ref();

    let link = Url::parse(field(mapping.link)).map_err(|source| DecodeError::Uri {
        position: mapping.link,
        source,
    })?;

    let start_at = parse_offset(field(mapping.start)).map_err(|source| {
        DecodeError::DurationFormat {
            field: DurationField::Start,
            source,
        }
    })?;
    let end_at = parse_offset(field(mapping.end)).map_err(|source| DecodeError::DurationFormat {
        field: DurationField::End,
        source,
    })?;

    let word = field(mapping.word).to_string();
    let file_name = scheme.content_key(&link, &word);

    Ok(Event {
        caption: caption(&word, start_at),
        link,
        word,
        file_name,
        start_at,
        end_at,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::DurationError;

    const COMPACT: ColumnMapping = ColumnMapping::new(0, 1, 2, 3);

    fn line(s: &str) -> Vec<&str> {
        s.split(',').collect()
    }

    #[test]
    fn test_decode_compact_line() {
        let record = line("00:00:00.400,00:00:00.540,all,https://example.com/i.jpg");
        let event = decode(&record, &COMPACT, KeyScheme::LinkAndLabel).unwrap();

        assert_eq!(event.word, "all");
        assert_eq!(event.link.as_str(), "https://example.com/i.jpg");
        assert_eq!(event.start_at, Duration::from_millis(400));
        assert_eq!(event.end_at, Duration::from_millis(540));

        let digest = format!("{:x}", md5::compute(b"https://example.com/i.jpgall"));
        assert!(event.file_name.contains(&digest));
        assert!(event.file_name.ends_with(".jpg"));
    }

    #[test]
    fn test_file_name_matches_wire_link() {
        let record = line("00:00:00.400,00:00:00.540,all,https://example.com");
        let event = decode(&record, &COMPACT, KeyScheme::LinkAndLabel).unwrap();

        let wire: serde_json::Value = serde_json::to_value(&event).unwrap();
        let link = wire["link"].as_str().unwrap();
        assert_eq!(link, "https://example.com/");

        let digest = format!("{:x}", md5::compute(format!("{}all", link)));
        assert_eq!(event.file_name, digest);
    }

    #[test]
    fn test_decode_default_mapping() {
        let record = line(
            "cap-1,00:01:02.003,00:01:02.500,fire,0.97,search,https://example.com/fire.png",
        );
        let event = RecordDecoder::default().decode(&record).unwrap();

        assert_eq!(event.word, "fire");
        assert_eq!(event.start_at, Duration::from_millis(62_003));
        assert!(event.file_name.ends_with(".png"));
    }

    #[test]
    fn test_decode_deterministic() {
        let record = line("00:00:00.400,00:00:00.540,all,https://example.com/i.jpg");
        for scheme in [KeyScheme::LinkAndLabel, KeyScheme::LabelledLink] {
            let a = decode(&record, &COMPACT, scheme).unwrap();
            let b = decode(&record, &COMPACT, scheme).unwrap();
            assert_eq!(a.file_name, b.file_name);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_schema_rejection() {
        // max index is 3, so four fields are needed
        let short = line("00:00:00.400,00:00:00.540,all");
        assert_eq!(
            decode(&short, &COMPACT, KeyScheme::LinkAndLabel),
            Err(DecodeError::Schema { len: 3, need: 4 })
        );

        let empty: Vec<&str> = Vec::new();
        assert!(matches!(
            decode(&empty, &COMPACT, KeyScheme::LinkAndLabel),
            Err(DecodeError::Schema { len: 0, .. })
        ));
    }

    #[test]
    fn test_schema_checked_before_fields() {
        // Bad link and bad offsets, but the length check fires first
        let record = line("x,y,z");
        assert!(matches!(
            decode(&record, &COMPACT, KeyScheme::LinkAndLabel),
            Err(DecodeError::Schema { .. })
        ));
    }

    #[test]
    fn test_uri_rejection() {
        let record = line("00:00:00.400,00:00:00.540,all,/relative/i.jpg");
        assert!(matches!(
            decode(&record, &COMPACT, KeyScheme::LinkAndLabel),
            Err(DecodeError::Uri { position: 3, .. })
        ));

        let record = line("00:00:00.400,00:00:00.540,all,not a uri");
        assert!(matches!(
            decode(&record, &COMPACT, KeyScheme::LinkAndLabel),
            Err(DecodeError::Uri { .. })
        ));
    }

    #[test]
    fn test_duration_names_field() {
        let record = line("00:60:00.000,00:00:00.540,all,https://example.com/i.jpg");
        assert_eq!(
            decode(&record, &COMPACT, KeyScheme::LinkAndLabel),
            Err(DecodeError::DurationFormat {
                field: DurationField::Start,
                source: DurationError::Minutes(60),
            })
        );

        let record = line("00:00:00.400,0:00:00.000,all,https://example.com/i.jpg");
        assert!(matches!(
            decode(&record, &COMPACT, KeyScheme::LinkAndLabel),
            Err(DecodeError::DurationFormat {
                field: DurationField::End,
                ..
            })
        ));
    }

    #[test]
    fn test_duration_boundary() {
        let ok = line("00:00:59.999,00:00:59.999,w,https://example.com/i.jpg");
        assert!(decode(&ok, &COMPACT, KeyScheme::LinkAndLabel).is_ok());

        for bad in ["00:60:00.000", "00:00:60.000", "0:00:00.000"] {
            let record = vec![bad, "00:00:00.000", "w", "https://example.com/i.jpg"];
            assert!(matches!(
                decode(&record, &COMPACT, KeyScheme::LinkAndLabel),
                Err(DecodeError::DurationFormat { .. })
            ));
        }
    }

    #[test]
    fn test_end_before_start_allowed() {
        let record = line("00:00:02.000,00:00:01.000,w,https://example.com/i.jpg");
        assert!(decode(&record, &COMPACT, KeyScheme::LinkAndLabel).is_ok());
    }

    #[test]
    fn test_caption() {
        let record = line("00:00:01.500,00:00:02.000,echo,https://example.com/i.jpg");
        let event = decode(&record, &COMPACT, KeyScheme::LinkAndLabel).unwrap();
        assert_eq!(event.caption, "\"echo\", heard after 1s 500ms");
    }
}
