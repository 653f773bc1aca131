//! `dis`: serve, replay or watch a discursive-image feed

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use dis_rs::client::{watch, StreamWatcher, WatchEvent};
use dis_rs::fetch::{DirStorage, FetchCache, FetchConfig, HttpRetriever};
use dis_rs::hub::{Hub, HubConfig};
use dis_rs::pipeline::{DrainReason, Ingestor, PipelineConfig, RecordStream, Supervisor};
use dis_rs::record::{ColumnMapping, RecordDecoder};
use dis_rs::relay::{ControlRelay, RelayConfig, UdpControlSender};
use dis_rs::replay::{replay, ReplayConfig};
use dis_rs::server::{DisServer, ServerConfig};

use cli::{Cli, Commands, ReplayArgs, ServeArgs, WatchArgs};

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries replayed records and watched events
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let result = match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Replay(args) => run_replay(args).await,
        Commands::Watch(args) => run_watch(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

/// One message per Ctrl+C
fn interrupts() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            if tx.send(()).await.is_err() {
                return;
            }
        }
    });
    rx
}

async fn serve(args: ServeArgs) -> Result<ExitCode, BoxError> {
    let sender = UdpControlSender::connect(&args.control_host, args.control_port).await?;
    tracing::info!(target = %sender.target(), "Control endpoint resolved");
    let relay = ControlRelay::with_config(
        Arc::new(sender),
        RelayConfig::default()
            .play_address(args.play_address)
            .stop_address(args.stop_address),
    );

    let storage = Arc::new(DirStorage::open_dir(&args.images).await?);
    tracing::info!(dir = %args.images.display(), "Media storage ready");

    let hub = Arc::new(Hub::with_config(
        HubConfig::default().mailbox_capacity(args.mailbox_capacity),
    ));
    let server = Arc::new(DisServer::new(
        ServerConfig::with_addr(args.addr).max_connections(args.max_connections),
        Arc::clone(&hub),
        relay,
        storage.clone(),
    ));

    let config = PipelineConfig::default()
        .mapping(ColumnMapping::new(args.cs, args.ce, args.cw, args.cl))
        .scheme(args.key_scheme)
        .grace_period(args.grace.into())
        .shutdown_timeout(args.shutdown_timeout.into());

    let retriever = HttpRetriever::new(&FetchConfig::default().timeout(args.fetch_timeout.into()))?;
    let ingestor = Ingestor::new(
        RecordDecoder::new(config.mapping).scheme(config.scheme),
        FetchCache::new(storage, Arc::new(retriever)),
        hub,
    );

    let shutdown = Supervisor::new(config, server, ingestor)
        .run(args.input, interrupts())
        .await?;

    Ok(match shutdown.reason {
        DrainReason::InputFailed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

async fn run_replay(args: ReplayArgs) -> Result<ExitCode, BoxError> {
    let records = args.input.open()?;
    let config = ReplayConfig::default().at_column(args.column);

    tokio::select! {
        stats = replay(config, records, std::io::stdout()) => {
            let stats = stats?;
            tracing::info!(written = stats.written, skipped = stats.skipped, "Replay finished");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Replay interrupted");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_watch(args: WatchArgs) -> Result<ExitCode, BoxError> {
    let url = args.url();
    let (watcher, mut events) = StreamWatcher::connect(&url).await?;

    // Each stdin line is `on-screen,<file name>` or `off-screen`
    let mut commands = RecordStream::spawn(std::io::stdin())?;
    let mut interrupts = interrupts();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(WatchEvent::Event(event)) => println!("{}", serde_json::to_string(&event)?),
                Some(WatchEvent::Error(message)) => {
                    tracing::warn!(message = %message, "Server replied with an error");
                }
                Some(WatchEvent::Unrecognized(text)) => println!("{}", text),
                Some(WatchEvent::Closed(reason)) => {
                    tracing::info!(reason = ?reason, "Connection closed");
                    return Ok(ExitCode::SUCCESS);
                }
                None => return Ok(ExitCode::SUCCESS),
            },
            Some(line) = commands.next() => {
                match watch::signal_from_record(&line?) {
                    Ok(signal) => watcher.send_signal(&signal).await?,
                    Err(e) => tracing::warn!(error = %e, "Ignoring command"),
                }
            }
            Some(()) = interrupts.recv() => {
                tracing::info!("Interrupt received, closing");
                watcher.close().await;
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}
