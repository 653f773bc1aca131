//! Record input
//!
//! Records are read by a dedicated thread and handed over through a bounded
//! channel. A blocked read on stdin must not keep the runtime from shutting
//! down, so this is a plain thread rather than a blocking task.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::str::FromStr;

use tokio::sync::mpsc;

use crate::error::InputError;

/// Records buffered between the reader thread and ingestion
const RECORD_BUFFER: usize = 64;

/// One raw record, or the error that ended the input
pub type RecordResult = Result<Vec<String>, InputError>;

/// Where records come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputSource {
    /// Standard input, written as `-`
    #[default]
    Stdin,
    /// A file on disk
    File(PathBuf),
}

impl InputSource {
    /// Open the source and start reading records
    pub fn open(&self) -> Result<RecordStream, InputError> {
        let reader: Box<dyn Read + Send> = match self {
            InputSource::Stdin => Box::new(io::stdin()),
            InputSource::File(path) => {
                let file = File::open(path).map_err(|source| InputError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
                Box::new(file)
            }
        };
        RecordStream::spawn(reader)
    }
}

impl FromStr for InputSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "-" => InputSource::Stdin,
            path => InputSource::File(PathBuf::from(path)),
        })
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Stdin => write!(f, "-"),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Stream of raw records
///
/// Yields `None` once the input is exhausted. A read error is yielded once
/// and ends the stream. Bytes that are not valid UTF-8 are replaced with
/// U+FFFD rather than failing the record.
pub struct RecordStream {
    rx: mpsc::Receiver<RecordResult>,
}

impl RecordStream {
    /// Wrap a channel fed by some other producer
    pub fn new(rx: mpsc::Receiver<RecordResult>) -> Self {
        Self { rx }
    }

    /// Read headerless CSV records from `reader` on a new thread
    pub fn spawn<R: Read + Send + 'static>(reader: R) -> Result<Self, InputError> {
        let (tx, rx) = mpsc::channel(RECORD_BUFFER);

        std::thread::Builder::new()
            .name("dis-input".to_string())
            .spawn(move || read_records(reader, tx))
            .map_err(InputError::Spawn)?;

        Ok(Self::new(rx))
    }

    /// Next record
    pub async fn next(&mut self) -> Option<RecordResult> {
        self.rx.recv().await
    }
}

fn read_records<R: Read>(reader: R, tx: mpsc::Sender<RecordResult>) {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(reader));

    for result in csv.byte_records() {
        let item = result
            .map(|record| {
                record
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect()
            })
            .map_err(InputError::from);
        let failed = item.is_err();

        // Receiver gone: ingestion has stopped
        if tx.blocking_send(item).is_err() || failed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    async fn collect(mut stream: RecordStream) -> Vec<RecordResult> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("-".parse::<InputSource>().unwrap(), InputSource::Stdin);
        assert_eq!(
            "words.csv".parse::<InputSource>().unwrap(),
            InputSource::File(PathBuf::from("words.csv"))
        );
        assert_eq!(InputSource::Stdin.to_string(), "-");
    }

    #[tokio::test]
    async fn test_reads_flexible_records() {
        let input = "00:00:00.400,00:00:00.540,all,https://example.com/i.jpg\n\
                     short,row\n\
                     a, b ,c\n";
        let stream = RecordStream::spawn(Cursor::new(input.to_string())).unwrap();
        let records: Vec<_> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0][2], "all");
        assert_eq!(records[1], vec!["short", "row"]);
        assert_eq!(records[2], vec!["a", "b", "c"]);
    }

    /// Serves `data`, then fails every later read
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::other("disk on fire")),
                n => Ok(n),
            }
        }
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let reader = FailingReader {
            data: Cursor::new(b"a,b\n".to_vec()),
        };
        let stream = RecordStream::spawn(reader).unwrap();
        let items = collect(stream).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &vec!["a", "b"]);
        assert!(matches!(items[1], Err(InputError::Read(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mut input = b"a,b\n".to_vec();
        input.extend_from_slice(b"w\xff,x\n");
        input.extend_from_slice(b"c\n");
        let stream = RecordStream::spawn(Cursor::new(input)).unwrap();
        let records: Vec<_> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 3);
        assert_eq!(records[1], vec!["w\u{fffd}", "x"]);
        assert_eq!(records[2], vec!["c"]);
    }

    #[tokio::test]
    async fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();

        let stream = InputSource::File(file.path().to_path_buf()).open().unwrap();
        let items = collect(stream).await;
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_open_missing_file() {
        let source = InputSource::File(PathBuf::from("/nonexistent/dis/input.csv"));
        assert!(matches!(source.open(), Err(InputError::Open { .. })));
    }
}
