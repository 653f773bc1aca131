//! Hub implementation
//!
//! The registry of subscriber mailboxes plus the last-event slot used to
//! replay the most recent event to late joiners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::config::HubConfig;
use super::error::HubError;
use super::mailbox::{Mailbox, SubscriberKey};
use crate::record::Event;

/// Sending side of one registered mailbox
///
/// `retired` fires when the slot leaves the registry, so a publish already
/// waiting on this mailbox gives up instead of delivering into it.
struct Slot {
    id: u64,
    tx: mpsc::Sender<Arc<Event>>,
    retired: CancellationToken,
}

impl Slot {
    fn retire(self) {
        self.retired.cancel();
    }
}

/// One mailbox a publish is delivering to
struct Target {
    key: SubscriberKey,
    id: u64,
    tx: mpsc::Sender<Arc<Event>>,
    retired: CancellationToken,
}

/// Snapshot of hub state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Registered mailboxes
    pub subscribers: usize,
    /// Whether a last event is held for replay
    pub has_last_event: bool,
    /// Events published so far
    pub published: u64,
    /// Whether the hub has been closed
    pub closed: bool,
}

/// Subscriber registry and fan-out broadcaster
///
/// Two locks, always taken in the same order (registry, then last event) and
/// never held across a send into a mailbox.
pub struct Hub {
    /// Key to mailbox sender
    registry: Mutex<HashMap<SubscriberKey, Slot>>,

    /// Most recently published event
    last_event: Mutex<Option<Arc<Event>>>,

    next_slot: AtomicU64,
    published: AtomicU64,
    closed: AtomicBool,

    config: HubConfig,
}

impl Hub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            last_event: Mutex::new(None),
            next_slot: AtomicU64::new(1),
            published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a mailbox under `key`
    ///
    /// If an event has been published, it is already queued in the returned
    /// mailbox. A mailbox previously registered under the same key is evicted
    /// and closed.
    pub async fn subscribe(&self, key: SubscriberKey) -> Result<Mailbox, HubError> {
        let (tx, rx) = mpsc::channel(self.config.mailbox_capacity.max(1));
        let id = self.next_slot.fetch_add(1, Ordering::Relaxed);

        let mut registry = self.registry.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(HubError::Closed);
        }

        let replayed = match self.last_event.lock().await.as_ref() {
            // The mailbox is empty and has room for at least one event
            Some(last) => tx.try_send(Arc::clone(last)).is_ok(),
            None => false,
        };

        let slot = Slot {
            id,
            tx,
            retired: CancellationToken::new(),
        };
        if let Some(previous) = registry.insert(key.clone(), slot) {
            previous.retire();
            tracing::warn!(subscriber = %key, "Subscriber key reused, previous mailbox evicted");
        }

        tracing::info!(
            subscriber = %key,
            subscribers = registry.len(),
            replayed = replayed,
            "Subscriber added"
        );

        Ok(Mailbox::new(key, id, rx))
    }

    /// Remove a mailbox
    ///
    /// Idempotent. Only removes the registration the mailbox came from, so a
    /// stale mailbox cannot unregister the one that evicted it.
    pub async fn unsubscribe(&self, mailbox: &Mailbox) {
        let mut registry = self.registry.lock().await;

        let current = registry
            .get(mailbox.key())
            .map(|slot| slot.id == mailbox.slot())
            .unwrap_or(false);
        if current {
            if let Some(slot) = registry.remove(mailbox.key()) {
                slot.retire();
            }
            tracing::debug!(
                subscriber = %mailbox.key(),
                subscribers = registry.len(),
                "Subscriber removed"
            );
        }
    }

    /// Publish an event to every registered mailbox
    ///
    /// Updates the last-event slot first, then pushes into each mailbox in
    /// registration-independent order, waiting while a mailbox is full.
    /// A mailbox evicted or unsubscribed meanwhile is skipped, even if the
    /// send was already waiting on it. Mailboxes whose subscriber has gone
    /// away are pruned. Returns the number of mailboxes the event was
    /// delivered to.
    pub async fn publish(&self, event: Event) -> Result<usize, HubError> {
        let event = Arc::new(event);

        let targets: Vec<Target> = {
            let registry = self.registry.lock().await;
            if self.closed.load(Ordering::Acquire) {
                return Err(HubError::Closed);
            }
            *self.last_event.lock().await = Some(Arc::clone(&event));
            self.published.fetch_add(1, Ordering::Relaxed);

            registry
                .iter()
                .map(|(key, slot)| Target {
                    key: key.clone(),
                    id: slot.id,
                    tx: slot.tx.clone(),
                    retired: slot.retired.clone(),
                })
                .collect()
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        for target in targets {
            // Dropping an unfinished send leaves the mailbox untouched
            let sent = tokio::select! {
                biased;
                _ = target.retired.cancelled() => continue,
                sent = target.tx.send(Arc::clone(&event)) => sent,
            };
            match sent {
                Ok(()) => delivered += 1,
                Err(_) => gone.push((target.key, target.id)),
            }
        }

        if !gone.is_empty() {
            let mut registry = self.registry.lock().await;
            for (key, id) in gone {
                if registry.get(&key).map(|slot| slot.id) == Some(id) {
                    if let Some(slot) = registry.remove(&key) {
                        slot.retire();
                    }
                    tracing::debug!(subscriber = %key, "Pruned closed mailbox");
                }
            }
        }

        tracing::debug!(
            key = %event.file_name,
            word = %event.word,
            delivered = delivered,
            "Event published"
        );

        Ok(delivered)
    }

    /// Most recently published event
    pub async fn last_event(&self) -> Option<Arc<Event>> {
        self.last_event.lock().await.clone()
    }

    /// Close every mailbox and refuse further subscriptions and publishes
    ///
    /// Events already queued stay readable; each mailbox yields `None` after
    /// its queue drains.
    pub async fn close(&self) {
        let mut registry = self.registry.lock().await;
        self.closed.store(true, Ordering::Release);

        let closed = registry.len();
        for (_, slot) in registry.drain() {
            slot.retire();
        }

        tracing::info!(subscribers = closed, "Hub closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of registered mailboxes
    pub async fn subscriber_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Get hub statistics
    pub async fn stats(&self) -> HubStats {
        let subscribers = self.registry.lock().await.len();
        let has_last_event = self.last_event.lock().await.is_some();

        HubStats {
            subscribers,
            has_last_event,
            published: self.published.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
