//! Feed watcher
//!
//! High-level API for subscribing to a feed server from the outside.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{ProtocolError, WatchError};
use crate::record::Event;
use crate::relay::{ClientEvent, ControlSignal, ErrorReply};

/// How long to wait for the server's close after sending ours
const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Events from the watcher
#[derive(Debug)]
pub enum WatchEvent {
    /// An event was broadcast
    Event(Box<Event>),

    /// The server rejected something we sent
    Error(String),

    /// A text frame that is neither an event nor an error reply
    Unrecognized(String),

    /// The connection ended, with the server's close reason if any
    Closed(Option<String>),
}

enum Command {
    Signal(String),
    Close(oneshot::Sender<()>),
}

/// Feed watcher
///
/// # Example
/// ```no_run
/// use dis_rs::client::{StreamWatcher, WatchEvent};
///
/// # async fn example() -> dis_rs::error::Result<()> {
/// let (watcher, mut events) = StreamWatcher::connect("ws://localhost:7745/di/stream").await?;
///
/// while let Some(event) = events.recv().await {
///     if let WatchEvent::Event(event) = event {
///         println!("{}", event.caption);
///     }
/// }
/// watcher.close().await;
/// # Ok(())
/// # }
/// ```
pub struct StreamWatcher {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl StreamWatcher {
    /// Connect to the subscription endpoint at `url`.
    ///
    /// Returns the watcher and a receiver for events.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<WatchEvent>), WatchError> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| WatchError::Connect {
                url: url.to_string(),
                source: Box::new(e),
            })?;
        tracing::info!(url = %url, "Connected");

        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(16);
        let task = tokio::spawn(pump(socket, command_rx, event_tx));

        let watcher = Self {
            commands: command_tx,
            task,
        };
        Ok((watcher, event_rx))
    }

    /// Send a control signal to the server.
    pub async fn send_signal(&self, signal: &ControlSignal) -> Result<(), WatchError> {
        let text = serde_json::to_string(&signal.to_client_event())?;
        self.commands
            .send(Command::Signal(text))
            .await
            .map_err(|_| WatchError::Disconnected)
    }

    /// Close cleanly: send a close frame, then wait briefly for the server's.
    pub async fn close(self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::Close(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
        let _ = self.task.await;
    }
}

async fn pump<S>(
    socket: S,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<WatchEvent>,
) where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            msg = stream.next() => {
                let Some(Ok(msg)) = msg else {
                    let _ = events.send(WatchEvent::Closed(None)).await;
                    return;
                };
                match msg {
                    Message::Text(text) => {
                        let _ = events.send(classify(text)).await;
                    }
                    Message::Close(frame) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        let _ = events.send(WatchEvent::Closed(reason)).await;
                        return;
                    }
                    // Pongs are written by the transport on the next poll
                    _ => {}
                }
            }
            command = commands.recv() => match command {
                Some(Command::Signal(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::warn!(error = %e, "Unable to send signal");
                    }
                }
                Some(Command::Close(done)) => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    };
                    if sink.send(Message::Close(Some(frame))).await.is_ok() {
                        let _ = tokio::time::timeout(CLOSE_WAIT, async {
                            while let Some(Ok(msg)) = stream.next().await {
                                if msg.is_close() {
                                    break;
                                }
                            }
                        })
                        .await;
                    }
                    let _ = events.send(WatchEvent::Closed(None)).await;
                    let _ = done.send(());
                    return;
                }
                None => return,
            },
        }
    }
}

/// Signal from a `kind[,file_name]` record
pub fn signal_from_record(record: &[String]) -> Result<ControlSignal, ProtocolError> {
    let event = ClientEvent {
        kind: record.first().cloned().unwrap_or_default(),
        file_name: record.get(1).filter(|name| !name.is_empty()).cloned(),
    };
    ControlSignal::try_from(event)
}

fn classify(text: String) -> WatchEvent {
    if let Some(reply) = ErrorReply::parse(&text) {
        return WatchEvent::Error(reply.message);
    }
    match serde_json::from_str::<Event>(&text) {
        Ok(event) => WatchEvent::Event(Box::new(event)),
        Err(_) => WatchEvent::Unrecognized(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::testing::TestServer;
    use crate::server::ServerConfig;

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify(r#"{"type":"error","message":"nope"}"#.to_string()),
            WatchEvent::Error(message) if message == "nope"
        ));
        assert!(matches!(
            classify("hello".to_string()),
            WatchEvent::Unrecognized(_)
        ));
    }

    #[test]
    fn test_signal_from_record() {
        let record = |fields: &[&str]| fields.iter().map(|f| f.to_string()).collect::<Vec<_>>();

        assert_eq!(
            signal_from_record(&record(&["on-screen", "a.jpg"])).unwrap(),
            ControlSignal::OnScreen {
                file_name: "a.jpg".to_string()
            }
        );
        assert_eq!(
            signal_from_record(&record(&["off-screen"])).unwrap(),
            ControlSignal::OffScreen
        );
        assert!(matches!(
            signal_from_record(&record(&["on-screen"])),
            Err(ProtocolError::MissingFileName)
        ));
        assert!(matches!(
            signal_from_record(&record(&[])),
            Err(ProtocolError::UnknownKind(_))
        ));
    }

    #[tokio::test]
    async fn test_watch_round_trip() {
        let server = TestServer::start(ServerConfig::default()).await;
        let (watcher, mut events) = StreamWatcher::connect(&server.ws()).await.unwrap();
        server.wait_for_subscribers(1).await;

        let event: Event = serde_json::from_str(
            r#"{"link":"https://example.com/i.jpg","word":"all","caption":"c",
                "file_name":"k.jpg","start_at":400,"end_at":540}"#,
        )
        .unwrap();
        server.hub.publish(event.clone()).await.unwrap();

        match events.recv().await.unwrap() {
            WatchEvent::Event(received) => assert_eq!(*received, event),
            other => panic!("unexpected {:?}", other),
        }

        watcher
            .send_signal(&ControlSignal::OnScreen {
                file_name: "k.jpg".to_string(),
            })
            .await
            .unwrap();
        let sent = server.wait_for_relayed(1).await;
        assert_eq!(sent[0].address, "max/play");

        watcher.close().await;
        server.wait_for_subscribers(0).await;
    }

    #[tokio::test]
    async fn test_server_close_reported() {
        let server = TestServer::start(ServerConfig::default()).await;
        let (_watcher, mut events) = StreamWatcher::connect(&server.ws()).await.unwrap();
        server.wait_for_subscribers(1).await;

        server.hub.close().await;

        match events.recv().await.unwrap() {
            WatchEvent::Closed(reason) => assert_eq!(reason.as_deref(), Some("feed ended")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let result = StreamWatcher::connect("ws://127.0.0.1:1/di/stream").await;
        assert!(matches!(result, Err(WatchError::Connect { .. })));
    }
}
