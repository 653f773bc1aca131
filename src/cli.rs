//! Command-line interface
//!
//! Every flag can also be set through a `DIS_*` environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use dis_rs::pipeline::InputSource;
use dis_rs::record::KeyScheme;

#[derive(Debug, Parser)]
#[command(
    name = "dis",
    about = "Live discursive-image feed",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest records and broadcast them to WebSocket subscribers.
    Serve(ServeArgs),
    /// Re-emit captured records at their original pace.
    Replay(ReplayArgs),
    /// Subscribe to a running server and print its events.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to serve subscribers and media on.
    #[arg(long, env = "DIS_ADDR", default_value = "0.0.0.0:7745")]
    pub addr: SocketAddr,

    /// Record input, `-` for stdin.
    #[arg(short, long, env = "DIS_INPUT", default_value = "-")]
    pub input: InputSource,

    /// Directory where fetched media is stored.
    #[arg(long, env = "DIS_IMAGES", default_value = "images")]
    pub images: PathBuf,

    /// Host of the audio control endpoint.
    #[arg(long, env = "DIS_CONTROL_HOST", default_value = "localhost")]
    pub control_host: String,

    /// UDP port of the audio control endpoint.
    #[arg(long, env = "DIS_CONTROL_PORT", default_value_t = 5498)]
    pub control_port: u16,

    /// OSC address for "start playback".
    #[arg(long, env = "DIS_PLAY_ADDRESS", default_value = "max/play")]
    pub play_address: String,

    /// OSC address for "stop playback".
    #[arg(long, env = "DIS_STOP_ADDRESS", default_value = "max/stop")]
    pub stop_address: String,

    /// Column of the start offset.
    #[arg(long, env = "DIS_CS", default_value_t = 1)]
    pub cs: usize,

    /// Column of the end offset.
    #[arg(long, env = "DIS_CE", default_value_t = 2)]
    pub ce: usize,

    /// Column of the word.
    #[arg(long, env = "DIS_CW", default_value_t = 3)]
    pub cw: usize,

    /// Column of the image link.
    #[arg(long, env = "DIS_CL", default_value_t = 6)]
    pub cl: usize,

    /// How content keys are derived: link-and-label or labelled-link.
    #[arg(long, env = "DIS_KEY_SCHEME", default_value = "link-and-label")]
    pub key_scheme: KeyScheme,

    /// Time subscribers keep receiving after the input ends.
    #[arg(long, env = "DIS_GRACE", default_value = "5s")]
    pub grace: humantime::Duration,

    /// Time allowed for connections to finish once the grace period is over.
    #[arg(long, env = "DIS_SHUTDOWN_TIMEOUT", default_value = "10s")]
    pub shutdown_timeout: humantime::Duration,

    /// Maximum concurrent subscribers, 0 for no limit.
    #[arg(long, env = "DIS_MAX_CONNECTIONS", default_value_t = 0)]
    pub max_connections: usize,

    /// Events queued per subscriber before ingestion waits.
    #[arg(long, env = "DIS_MAILBOX_CAPACITY", default_value_t = 50)]
    pub mailbox_capacity: usize,

    /// Upper bound for retrieving one image.
    #[arg(long, env = "DIS_FETCH_TIMEOUT", default_value = "30s")]
    pub fetch_timeout: humantime::Duration,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Captured records, `-` for stdin.
    #[arg(short, long, env = "DIS_REPLAY_INPUT", default_value = "-")]
    pub input: InputSource,

    /// Column holding the offset each record was written at.
    #[arg(long, env = "DIS_REPLAY_COLUMN", default_value_t = 0)]
    pub column: usize,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Server to connect to.
    #[arg(long, env = "DIS_HOST", default_value = "localhost:7745")]
    pub host: String,

    /// Full subscription URL, overrides --host.
    #[arg(long, env = "DIS_URL")]
    pub url: Option<String>,
}

impl WatchArgs {
    pub fn url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("ws://{}{}", self.host, dis_rs::server::STREAM_PATH),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["dis", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        assert_eq!(args.addr.port(), 7745);
        assert_eq!(args.input, InputSource::Stdin);
        assert_eq!((args.cs, args.ce, args.cw, args.cl), (1, 2, 3, 6));
        assert_eq!(args.key_scheme, KeyScheme::LinkAndLabel);
        assert_eq!(Duration::from(args.grace), Duration::from_secs(5));
        assert_eq!(args.control_port, 5498);
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "dis",
            "serve",
            "--input",
            "words.csv",
            "--cs",
            "0",
            "--key-scheme",
            "labelled-link",
            "--grace",
            "1500ms",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        assert_eq!(args.input, InputSource::File(PathBuf::from("words.csv")));
        assert_eq!(args.cs, 0);
        assert_eq!(args.key_scheme, KeyScheme::LabelledLink);
        assert_eq!(Duration::from(args.grace), Duration::from_millis(1500));
    }

    #[test]
    fn test_bad_key_scheme() {
        assert!(Cli::try_parse_from(["dis", "serve", "--key-scheme", "md5"]).is_err());
    }

    #[test]
    fn test_watch_url() {
        let cli = Cli::try_parse_from(["dis", "watch", "--host", "feed:9000"]).unwrap();
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.url(), "ws://feed:9000/di/stream");
    }
}
