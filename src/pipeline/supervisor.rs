//! Pipeline supervisor
//!
//! Drives the whole process through its lifecycle:
//!
//! ```text
//!   Starting ──► Running ──► Draining ──► Stopped
//!      │            │            │
//!   bind, open   ingest      grace period, then close hub,
//!   input        records     stop accepting, join pumps
//! ```
//!
//! Draining starts when ingestion completes (end of input or a read error)
//! or on the first interrupt. A second interrupt cuts the grace period short.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::config::PipelineConfig;
use super::ingest::{Ended, Ingestor};
use super::input::{InputSource, RecordStream};
use crate::error::{Error, InputError, Result};
use crate::server::DisServer;
use crate::stats::PipelineSnapshot;

/// Supervisor lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Binding the listener and opening the input
    Starting,
    /// Ingesting records and serving subscribers
    Running,
    /// Grace period before shutdown
    Draining,
    /// Terminal
    Stopped,
}

/// Why draining started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    /// Every record was read
    InputExhausted,
    /// The input failed
    InputFailed,
    /// An interrupt was received
    Interrupted,
}

/// Summary of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shutdown {
    pub reason: DrainReason,
    pub stats: PipelineSnapshot,
}

pub struct Supervisor {
    config: PipelineConfig,
    server: Arc<DisServer>,
    ingestor: Arc<Ingestor>,
    phase: watch::Sender<PipelinePhase>,
}

impl Supervisor {
    pub fn new(config: PipelineConfig, server: Arc<DisServer>, ingestor: Ingestor) -> Self {
        let (phase, _) = watch::channel(PipelinePhase::Starting);
        Self {
            config,
            server,
            ingestor: Arc::new(ingestor),
            phase,
        }
    }

    /// Follow phase transitions
    pub fn phase(&self) -> watch::Receiver<PipelinePhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: PipelinePhase) {
        tracing::info!(phase = ?phase, "Pipeline phase");
        self.phase.send_replace(phase);
    }

    /// Run the pipeline to completion
    ///
    /// Each message on `interrupts` counts as one interrupt. Returns an error
    /// only if the listener cannot be bound or fails while serving.
    pub async fn run(
        self,
        input: InputSource,
        interrupts: mpsc::Receiver<()>,
    ) -> Result<Shutdown> {
        self.set_phase(PipelinePhase::Starting);

        let listener = self.server.bind().await?;
        let records = input.open().map_err(Error::Input)?;
        tracing::info!(input = %input, "Input opened");

        self.run_bound(listener, records, interrupts).await
    }

    /// Run with an already bound listener and an open record stream
    pub async fn run_bound(
        self,
        listener: TcpListener,
        mut records: RecordStream,
        mut interrupts: mpsc::Receiver<()>,
    ) -> Result<Shutdown> {
        let hub = Arc::clone(self.server.hub());

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut server_task = tokio::spawn(Arc::clone(&self.server).serve(listener, async {
            let _ = stop_rx.await;
        }));

        let cancel = CancellationToken::new();
        let (done_tx, mut done_rx) = oneshot::channel::<std::result::Result<Ended, InputError>>();
        let ingest_task = {
            let ingestor = Arc::clone(&self.ingestor);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = ingestor.run(&mut records, cancel).await;
                let _ = done_tx.send(result);
            })
        };

        self.set_phase(PipelinePhase::Running);

        let reason = tokio::select! {
            done = &mut done_rx => match done {
                Ok(Ok(_)) => {
                    tracing::info!("Input exhausted");
                    DrainReason::InputExhausted
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Input failed");
                    DrainReason::InputFailed
                }
                Err(_) => {
                    tracing::error!("Ingestion stopped without reporting");
                    DrainReason::InputFailed
                }
            },
            Some(()) = interrupts.recv() => {
                tracing::info!("Interrupt received");
                DrainReason::Interrupted
            }
            served = &mut server_task => {
                // The listener only returns early on failure
                cancel.cancel();
                hub.close().await;
                let _ = ingest_task.await;
                self.set_phase(PipelinePhase::Stopped);
                return Err(listener_failure(served));
            }
        };

        self.set_phase(PipelinePhase::Draining);
        cancel.cancel();

        let grace = self.config.grace_period;
        let subscribers = hub.subscriber_count().await;
        tracing::info!(
            grace_ms = grace.as_millis() as u64,
            subscribers = subscribers,
            "Draining"
        );
        tokio::select! {
            _ = tokio::time::sleep(grace) => {}
            Some(()) = interrupts.recv() => {
                tracing::info!("Grace period cut short");
            }
        }

        hub.close().await;
        let _ = stop_tx.send(());

        let tracker = self.server.tracker();
        tracker.close();
        if tokio::time::timeout(self.config.shutdown_timeout, tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = tracker.len(),
                "Connections still open after shutdown timeout"
            );
        }

        let served = tokio::time::timeout(self.config.shutdown_timeout, server_task).await;
        let _ = ingest_task.await;

        let stats = self.ingestor.stats().snapshot();
        tracing::info!(
            records = stats.records,
            rejected = stats.rejected,
            fetch_failures = stats.fetch_failures,
            downloads = stats.downloads,
            cache_hits = stats.cache_hits,
            published = stats.published,
            "Pipeline finished"
        );
        self.set_phase(PipelinePhase::Stopped);

        match served {
            Ok(Ok(Ok(()))) => {}
            Ok(served) => return Err(listener_failure(served)),
            Err(_) => tracing::warn!("Listener did not stop within the shutdown timeout"),
        }

        Ok(Shutdown { reason, stats })
    }
}

fn listener_failure(
    served: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Error {
    match served {
        Ok(Err(e)) => e,
        Ok(Ok(())) => Error::Listener(std::io::Error::other("listener stopped unexpectedly")),
        Err(e) => Error::Listener(std::io::Error::other(e)),
    }
}
