//! Subscriber keys and mailboxes

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::record::Event;

/// Identity of a subscriber in the hub
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberKey(String);

impl SubscriberKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a network peer
    ///
    /// The connection id and timestamp keep keys distinct when the same peer
    /// reconnects quickly.
    pub fn for_peer(peer: SocketAddr, connection_id: u64) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self(format!("{}-{}-{}", peer, nanos, connection_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounded queue of events owned by one subscriber
///
/// Yields `None` once the hub has dropped its side: on unsubscribe, on
/// eviction by a newer mailbox with the same key, or on hub close.
#[derive(Debug)]
pub struct Mailbox {
    key: SubscriberKey,
    slot: u64,
    rx: mpsc::Receiver<Arc<Event>>,
}

impl Mailbox {
    pub(super) fn new(key: SubscriberKey, slot: u64, rx: mpsc::Receiver<Arc<Event>>) -> Self {
        Self { key, slot, rx }
    }

    /// Key this mailbox is registered under
    pub fn key(&self) -> &SubscriberKey {
        &self.key
    }

    pub(super) fn slot(&self) -> u64 {
        self.slot
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.rx.recv().await
    }

    /// Take an event if one is queued
    pub fn try_recv(&mut self) -> Result<Arc<Event>, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}
