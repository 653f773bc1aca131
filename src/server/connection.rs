//! Per-subscriber connection pump
//!
//! One connection runs two loops over the split WebSocket, joined in a single
//! `select!` so neither can outlive the other:
//!
//! ```text
//!              ┌────────────── outbound ───────────────┐
//!   Mailbox ──►│ event  ──► JSON text frame            │
//!   replies ──►│ error  ──► JSON text frame            ├──► sink
//!   ticker  ──►│ tick   ──► ping                       │
//!              └───────────────────────────────────────┘
//!              ┌────────────── inbound ────────────────┐
//!   stream ───►│ pong   ──► renew liveness deadline    │
//!              │ text   ──► ControlSignal ──► relay    │
//!              │ other  ──► error reply                │
//!              └───────────────────────────────────────┘
//! ```
//!
//! Whichever loop ends first ends the session; the mailbox is then
//! unregistered and the socket closed.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant, MissedTickBehavior};

use super::config::{ServerConfig, MIN_PING_PERIOD};
use crate::error::{ConnectionError, ProtocolError};
use crate::hub::{Hub, Mailbox};
use crate::relay::{ControlRelay, ControlSignal, ErrorReply};
use crate::session::{SessionContext, SessionState};
use crate::stats::{SessionCounters, SessionStats};

/// Queued error replies per connection
const REPLY_CAPACITY: usize = 16;

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The hub closed or evicted the mailbox
    MailboxClosed,
    /// The subscriber sent a close frame
    PeerClosed,
    /// The stream ended without a close frame
    PeerGone,
    /// The hub refused the subscription
    Refused,
}

/// One subscriber connection
pub struct Connection {
    state: SessionState,
    config: ServerConfig,
    hub: Arc<Hub>,
    relay: ControlRelay,
    counters: SessionCounters,
}

impl Connection {
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        hub: Arc<Hub>,
        relay: ControlRelay,
    ) -> Self {
        Self {
            state: SessionState::new(session_id, peer_addr),
            config,
            hub,
            relay,
            counters: SessionCounters::new(),
        }
    }

    /// Run the session until either side ends it
    pub async fn run(mut self, socket: WebSocket) -> Result<(Exit, SessionStats), ConnectionError> {
        let ctx = SessionContext::from(&self.state);
        let (mut sink, mut stream) = socket.split();

        let mut mailbox = match self.hub.subscribe(ctx.key.clone()).await {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::debug!(session_id = ctx.session_id, error = %e, "Subscription refused");
                self.state.close();
                self.send_close(&mut sink).await;
                self.state.finish();
                return Ok((Exit::Refused, self.stats()));
            }
        };
        self.state.activate();

        tracing::debug!(
            session_id = ctx.session_id,
            peer = %ctx.peer_addr,
            subscriber = %ctx.key,
            "Subscriber connected"
        );

        let (reply_tx, mut reply_rx) = mpsc::channel(REPLY_CAPACITY);
        let result = {
            let outbound = self.outbound(&mut sink, &mut mailbox, &mut reply_rx);
            let inbound = self.inbound(&mut stream, &reply_tx);
            tokio::select! {
                r = outbound => r,
                r = inbound => r,
            }
        };

        self.state.close();
        self.hub.unsubscribe(&mailbox).await;
        drop(mailbox);
        if !matches!(result, Ok(Exit::MailboxClosed)) {
            self.send_close(&mut sink).await;
        }
        self.state.finish();

        let stats = self.stats();
        match &result {
            Ok(exit) => tracing::debug!(
                session_id = ctx.session_id,
                subscriber = %ctx.key,
                reason = ?exit,
                events_sent = stats.events_sent,
                pings_sent = stats.pings_sent,
                signals_relayed = stats.signals_relayed,
                protocol_errors = stats.protocol_errors,
                duration_ms = stats.duration.as_millis() as u64,
                "Subscriber disconnected"
            ),
            Err(e) => tracing::info!(
                session_id = ctx.session_id,
                subscriber = %ctx.key,
                error = %e,
                events_sent = stats.events_sent,
                duration_ms = stats.duration.as_millis() as u64,
                "Subscriber connection failed"
            ),
        }

        result.map(|exit| (exit, stats))
    }

    fn stats(&self) -> SessionStats {
        self.counters.snapshot(self.state.duration())
    }

    async fn outbound(
        &self,
        sink: &mut SplitSink<WebSocket, Message>,
        mailbox: &mut Mailbox,
        replies: &mut mpsc::Receiver<String>,
    ) -> Result<Exit, ConnectionError> {
        // The fields are public, so a zero period can still arrive here
        let period = self.config.ping_period.max(MIN_PING_PERIOD);
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = mailbox.recv() => match event {
                    Some(event) => {
                        let text = serde_json::to_string(&*event)?;
                        self.write(sink, Message::Text(text)).await?;
                        self.counters.event_sent();
                    }
                    None => {
                        self.write(sink, close_message()).await?;
                        return Ok(Exit::MailboxClosed);
                    }
                },
                Some(reply) = replies.recv() => {
                    self.write(sink, Message::Text(reply)).await?;
                }
                _ = ping.tick() => {
                    self.write(sink, Message::Ping(Vec::new())).await?;
                    self.counters.ping_sent();
                }
            }
        }
    }

    async fn inbound(
        &self,
        stream: &mut SplitStream<WebSocket>,
        replies: &mpsc::Sender<String>,
    ) -> Result<Exit, ConnectionError> {
        let pong_wait = self.config.pong_wait;
        let mut deadline = Instant::now() + pong_wait;

        loop {
            let msg = match timeout_at(deadline, stream.next()).await {
                Err(_) => return Err(ConnectionError::Liveness(pong_wait)),
                Ok(None) => return Ok(Exit::PeerGone),
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(msg))) => msg,
            };

            match msg {
                Message::Pong(_) => deadline = Instant::now() + pong_wait,
                // Answered by the transport
                Message::Ping(_) => {}
                Message::Text(text) => self.handle_text(&text, replies).await,
                Message::Binary(_) => self.reject(ProtocolError::Binary, replies),
                Message::Close(_) => return Ok(Exit::PeerClosed),
            }
        }
    }

    async fn handle_text(&self, text: &str, replies: &mpsc::Sender<String>) {
        let signal = match ControlSignal::parse(text) {
            Ok(signal) => signal,
            Err(e) => return self.reject(e, replies),
        };

        match self.relay.relay(&signal).await {
            Ok(ack) => {
                self.counters.signal_relayed();
                tracing::debug!(
                    session_id = self.state.id,
                    address = %ack.address,
                    signal = ?signal,
                    "Control signal relayed"
                );
            }
            Err(e) => {
                tracing::warn!(session_id = self.state.id, error = %e, "Control relay failed");
                self.reply(ErrorReply::new(&e), replies);
            }
        }
    }

    fn reject(&self, error: ProtocolError, replies: &mpsc::Sender<String>) {
        tracing::debug!(session_id = self.state.id, error = %error, "Protocol error");
        self.reply(ErrorReply::new(&error), replies);
    }

    fn reply(&self, reply: ErrorReply, replies: &mpsc::Sender<String>) {
        self.counters.protocol_error();
        if replies.try_send(reply.to_json()).is_err() {
            tracing::debug!(session_id = self.state.id, "Error reply dropped, queue full");
        }
    }

    async fn write(
        &self,
        sink: &mut SplitSink<WebSocket, Message>,
        msg: Message,
    ) -> Result<(), ConnectionError> {
        match timeout(self.config.write_wait, sink.send(msg)).await {
            Ok(result) => result.map_err(ConnectionError::from),
            Err(_) => Err(ConnectionError::WriteTimeout(self.config.write_wait)),
        }
    }

    /// Best-effort close frame, bounded by the write deadline
    async fn send_close(&self, sink: &mut SplitSink<WebSocket, Message>) {
        let _ = timeout(self.config.write_wait, async {
            let _ = sink.send(close_message()).await;
            let _ = sink.close().await;
        })
        .await;
    }
}

fn close_message() -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::AWAY,
        reason: Cow::from("feed ended"),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use futures_util::SinkExt;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use url::Url;

    use super::*;
    use crate::hub::HubConfig;
    use crate::record::Event;
    use crate::relay::OscArg;
    use crate::server::testing::{next_message, next_text, TestServer};

    fn event(word: &str) -> Event {
        Event {
            link: Url::parse("https://example.com/i.jpg").unwrap(),
            word: word.to_string(),
            caption: crate::record::event::caption(word, Duration::from_millis(400)),
            file_name: format!("{}.jpg", word),
            start_at: Duration::from_millis(400),
            end_at: Duration::from_millis(540),
        }
    }

    fn text(s: &str) -> WsMessage {
        WsMessage::Text(s.to_string())
    }

    #[tokio::test]
    async fn test_late_join_replay() {
        let server = TestServer::start(ServerConfig::default()).await;
        server.hub.publish(event("earlier")).await.unwrap();

        let mut client = server.connect().await;
        let received: Event = serde_json::from_str(&next_text(&mut client).await).unwrap();

        assert_eq!(received, event("earlier"));
    }

    #[tokio::test]
    async fn test_broadcast_in_order() {
        let server = TestServer::start(ServerConfig::default()).await;
        let mut a = server.connect().await;
        let mut b = server.connect().await;
        server.wait_for_subscribers(2).await;

        for word in ["one", "two", "three"] {
            server.hub.publish(event(word)).await.unwrap();
        }

        for client in [&mut a, &mut b] {
            for word in ["one", "two", "three"] {
                let received: Event = serde_json::from_str(&next_text(client).await).unwrap();
                assert_eq!(received.word, word);
            }
        }
    }

    #[tokio::test]
    async fn test_signals_relayed() {
        let server = TestServer::start(ServerConfig::default()).await;
        let mut client = server.connect().await;

        client
            .send(text(r#"{"type":"on-screen","file_name":"abc.jpg"}"#))
            .await
            .unwrap();
        client.send(text(r#"{"type":"off-screen"}"#)).await.unwrap();

        let sent = server.wait_for_relayed(2).await;
        assert_eq!(sent[0].address, "max/play");
        assert_eq!(sent[0].args, vec![OscArg::Str("abc.jpg".to_string())]);
        assert_eq!(sent[1].address, "max/stop");
    }

    #[tokio::test]
    async fn test_unknown_kind_keeps_connection() {
        let server = TestServer::start(ServerConfig::default()).await;
        let mut client = server.connect().await;
        server.wait_for_subscribers(1).await;

        client.send(text(r#"{"type":"sideways"}"#)).await.unwrap();
        let reply = ErrorReply::parse(&next_text(&mut client).await).unwrap();
        assert!(reply.message.contains("sideways"));

        // Still subscribed
        server.hub.publish(event("after")).await.unwrap();
        let received: Event = serde_json::from_str(&next_text(&mut client).await).unwrap();
        assert_eq!(received.word, "after");
    }

    #[tokio::test]
    async fn test_malformed_and_binary_rejected() {
        let server = TestServer::start(ServerConfig::default()).await;
        let mut client = server.connect().await;

        client.send(text("{not json")).await.unwrap();
        assert!(ErrorReply::parse(&next_text(&mut client).await).is_some());

        client.send(WsMessage::Binary(vec![1, 2, 3])).await.unwrap();
        let reply = ErrorReply::parse(&next_text(&mut client).await).unwrap();
        assert_eq!(reply.message, "binary frames are not accepted");

        assert!(server.control.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relay_failure_reported() {
        let server = TestServer::start(ServerConfig::default()).await;
        server.control.fail.store(true, Ordering::SeqCst);
        let mut client = server.connect().await;

        client.send(text(r#"{"type":"off-screen"}"#)).await.unwrap();
        let reply = ErrorReply::parse(&next_text(&mut client).await).unwrap();
        assert!(reply.message.contains("max/stop"));
    }

    #[tokio::test]
    async fn test_hub_close_sends_close_frame() {
        let server = TestServer::start(ServerConfig::default()).await;
        let mut client = server.connect().await;
        server.wait_for_subscribers(1).await;

        server.hub.publish(event("final")).await.unwrap();
        server.hub.close().await;

        // The queued event is still delivered before the close
        let received: Event = serde_json::from_str(&next_text(&mut client).await).unwrap();
        assert_eq!(received.word, "final");
        assert!(matches!(next_message(&mut client).await, WsMessage::Close(_)));
    }

    #[tokio::test]
    async fn test_client_close_unsubscribes() {
        let server = TestServer::start(ServerConfig::default()).await;
        let mut client = server.connect().await;
        server.wait_for_subscribers(1).await;

        client.close(None).await.unwrap();
        server.wait_for_subscribers(0).await;
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let config = ServerConfig::default().pong_wait(Duration::from_millis(300));
        let server = TestServer::start(config).await;

        // Never read, so pings are never answered
        let _client = server.connect().await;
        server.wait_for_subscribers(1).await;
        server.wait_for_subscribers(0).await;
    }

    #[tokio::test]
    async fn test_stalled_client_hits_write_deadline() {
        let config = ServerConfig::default().write_wait(Duration::from_millis(200));
        let server =
            TestServer::start_with_hub(config, HubConfig::default().mailbox_capacity(1)).await;

        // Never read, so the socket buffers fill and writes stall
        let _client = server.connect().await;
        server.wait_for_subscribers(1).await;

        let hub = Arc::clone(&server.hub);
        let publisher = tokio::spawn(async move {
            let big = event(&"x".repeat(1 << 20));
            for _ in 0..500 {
                if hub.publish(big.clone()).await.unwrap() == 0 {
                    return true;
                }
            }
            false
        });

        server.wait_for_subscribers(0).await;
        let released = tokio::time::timeout(Duration::from_secs(5), publisher)
            .await
            .expect("publisher still blocked")
            .unwrap();
        assert!(released);
    }

    #[tokio::test]
    async fn test_responsive_client_stays() {
        let config = ServerConfig::default()
            .pong_wait(Duration::from_millis(400))
            .ping_period(Duration::from_millis(150));
        let server = TestServer::start(config).await;
        let mut client = server.connect().await;
        server.wait_for_subscribers(1).await;

        // Reading answers pings; stay connected across several pong waits
        let reader = tokio::time::timeout(Duration::from_millis(1200), async {
            while let Some(Ok(_)) = client.next().await {}
        });
        let _ = reader.await;

        assert_eq!(server.hub.subscriber_count().await, 1);
    }
}
