//! Watch fan-out
//!
//! In-process subscribers get change events over bounded channels with
//! non-blocking publish: a full buffer drops the event for that
//! subscriber (its lag counter records the gap), never blocks the
//! writer. A dropped subscriber is reaped on the next publish attempt —
//! the registry never keeps a subscriber alive.
//!
//! Events reach a subscriber in CSN order; backpressure creates gaps,
//! never reorderings.

use parking_lot::RwLock;
use pulse_core::{CollectiveId, Csn, WatchEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Attributes of the affected experience, for subscriber filters
///
/// Captured by the write path before commit so `Deleted` events can still
/// be filtered on the row's last-known attributes.
#[derive(Debug, Clone)]
pub struct EventAttributes {
    /// The experience's domain tags
    pub domain_tags: Vec<String>,
    /// The experience's type tag (0–8)
    pub type_tag: u8,
    /// The experience's importance
    pub importance: f32,
}

/// Optional per-subscriber event filter
#[derive(Debug, Clone, Default)]
pub struct WatchFilter {
    /// Deliver only experiences carrying at least one of these tags
    pub domains: Option<Vec<String>>,
    /// Deliver only these experience type tags
    pub type_tags: Option<Vec<u8>>,
    /// Deliver only experiences at or above this importance
    pub min_importance: Option<f32>,
}

impl WatchFilter {
    fn matches(&self, attrs: &EventAttributes) -> bool {
        if let Some(domains) = &self.domains {
            if !domains.iter().any(|d| attrs.domain_tags.contains(d)) {
                return false;
            }
        }
        if let Some(tags) = &self.type_tags {
            if !tags.contains(&attrs.type_tag) {
                return false;
            }
        }
        if let Some(min) = self.min_importance {
            if attrs.importance < min {
                return false;
            }
        }
        true
    }
}

struct SubscriberEntry {
    id: u64,
    filter: Option<WatchFilter>,
    sender: SyncSender<WatchEvent>,
    lag: Arc<AtomicU64>,
}

/// Receiving half of a watch subscription
///
/// A pull interface over the bounded channel. Dropping it ends the
/// subscription; the registry notices on its next publish.
pub struct WatchSubscriber {
    receiver: Receiver<WatchEvent>,
    lag: Arc<AtomicU64>,
}

impl WatchSubscriber {
    /// Block until the next event arrives or every sender is gone
    pub fn recv(&self) -> Option<WatchEvent> {
        self.receiver.recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take an event if one is already buffered
    pub fn try_recv(&self) -> Option<WatchEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Events dropped for this subscriber because its buffer was full
    pub fn lag(&self) -> u64 {
        self.lag.load(Ordering::Relaxed)
    }
}

/// Per-collective subscriber registry
///
/// Publish takes the read side, subscribe/unsubscribe the write side.
pub struct WatchRegistry {
    subscribers: RwLock<HashMap<CollectiveId, Vec<SubscriberEntry>>>,
    next_id: AtomicU64,
    buffer_size: usize,
    enabled: bool,
}

impl WatchRegistry {
    /// Create a registry with the configured per-subscriber buffer
    pub fn new(buffer_size: usize, enabled: bool) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size,
            enabled,
        }
    }

    /// Register a subscriber for one collective
    pub fn subscribe(
        &self,
        collective_id: CollectiveId,
        filter: Option<WatchFilter>,
    ) -> WatchSubscriber {
        let (sender, receiver) = sync_channel(self.buffer_size);
        let lag = Arc::new(AtomicU64::new(0));
        let entry = SubscriberEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            filter,
            sender,
            lag: Arc::clone(&lag),
        };
        self.subscribers
            .write()
            .entry(collective_id)
            .or_default()
            .push(entry);
        WatchSubscriber { receiver, lag }
    }

    /// Number of live subscribers for a collective
    pub fn subscriber_count(&self, collective_id: CollectiveId) -> usize {
        self.subscribers
            .read()
            .get(&collective_id)
            .map_or(0, |list| list.len())
    }

    /// Deliver an event to every matching subscriber, without blocking
    pub fn publish(&self, event: &WatchEvent, attrs: &EventAttributes) {
        if !self.enabled {
            return;
        }

        let mut dead: Vec<u64> = Vec::new();
        {
            let subscribers = self.subscribers.read();
            let Some(list) = subscribers.get(&event.collective_id) else {
                return;
            };
            for entry in list {
                if let Some(filter) = &entry.filter {
                    if !filter.matches(attrs) {
                        continue;
                    }
                }
                match entry.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        entry.lag.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => dead.push(entry.id),
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            if let Some(list) = subscribers.get_mut(&event.collective_id) {
                list.retain(|entry| !dead.contains(&entry.id));
                debug!(
                    collective = %event.collective_id,
                    reaped = dead.len(),
                    "reaped disconnected watch subscribers"
                );
            }
        }
    }

    /// Drop every subscriber of a collective (collective deletion)
    pub fn remove_collective(&self, collective_id: CollectiveId) {
        self.subscribers.write().remove(&collective_id);
    }
}

/// Result of a cross-process `poll_changes` call
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    /// Events with CSN in `(since_csn, csn]`, oldest first
    pub events: Vec<WatchEvent>,
    /// The CSN the poll observed; pass as `since_csn` next time
    pub csn: Csn,
    /// True if `since_csn` had already fallen off the changelog ring —
    /// events were missed and the caller should rescan
    pub ring_truncated: bool,
}
