//! Test harness: a real server on a loopback port with in-memory collaborators

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{DisServer, ServerConfig};
use crate::error::RelayError;
use crate::fetch::{MemoryStorage, Storage};
use crate::hub::{Hub, HubConfig};
use crate::relay::{ControlRelay, ControlSender, OscMessage};

pub(crate) type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Records every message; fails on demand
#[derive(Default)]
pub(crate) struct RecordingSender {
    pub sent: Mutex<Vec<OscMessage>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl ControlSender for RecordingSender {
    async fn send(&self, msg: &OscMessage) -> Result<(), RelayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RelayError::Send {
                address: msg.address.clone(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }
}

pub(crate) struct TestServer {
    pub server: Arc<DisServer>,
    pub hub: Arc<Hub>,
    pub control: Arc<RecordingSender>,
    pub storage: MemoryStorage,
    pub addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub async fn start(config: ServerConfig) -> Self {
        Self::start_with_hub(config, HubConfig::default()).await
    }

    pub async fn start_with_hub(config: ServerConfig, hub_config: HubConfig) -> Self {
        let hub = Arc::new(Hub::with_config(hub_config));
        let control = Arc::new(RecordingSender::default());
        let storage = MemoryStorage::new();

        let server = Arc::new(DisServer::new(
            config.bind(SocketAddr::from(([127, 0, 0, 1], 0))),
            Arc::clone(&hub),
            ControlRelay::new(control.clone()),
            Arc::new(storage.clone()),
        ));

        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(Arc::clone(&server).serve(listener, async {
            let _ = rx.await;
        }));

        Self {
            server,
            hub,
            control,
            storage,
            addr,
            _shutdown: tx,
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self) -> String {
        format!("ws://{}/di/stream", self.addr)
    }

    pub async fn connect(&self) -> WsClient {
        tokio_tungstenite::connect_async(self.ws()).await.unwrap().0
    }

    pub async fn store(&self, key: &str, bytes: &[u8]) {
        let mut sink = self.storage.create(key).await.unwrap();
        sink.write_all(bytes).await.unwrap();
        sink.shutdown().await.unwrap();
    }

    pub async fn wait_for_subscribers(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.hub.subscriber_count().await != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {} subscribers", n));
    }

    pub async fn wait_for_relayed(&self, n: usize) -> Vec<OscMessage> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let sent = self.control.sent.lock().unwrap();
                    if sent.len() >= n {
                        return sent.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }
}

/// Next non-control message
pub(crate) async fn next_message(client: &mut WsClient) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("transport error");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

/// Next text message
pub(crate) async fn next_text(client: &mut WsClient) -> String {
    match next_message(client).await {
        Message::Text(text) => text,
        other => panic!("expected text, got {:?}", other),
    }
}
