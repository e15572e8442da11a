//! Subscription manager for broadcasting collection snapshots.

use crate::types::{CollectionPath, Document};
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{CollectionEvent, DropReason, SubscriptionId, WatchHandle};

/// Internal subscription state.
#[derive(Debug)]
struct Subscription {
    /// The collection path this subscriber watches.
    path: String,
    sender: Sender<CollectionEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (subscriber will be dropped).
    fn try_send(&self, event: CollectionEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Manages subscriptions and broadcasts full-snapshot events per path.
#[derive(Debug)]
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscription on a collection path.
    ///
    /// The subscription delivers nothing until the first snapshot is pushed;
    /// the store sends the registration snapshot via [`Self::send_to`]
    /// while it holds the write lock, so no committed change is missed.
    pub fn subscribe(&self, path: &CollectionPath, buffer_size: usize) -> WatchHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(buffer_size);

        let subscription = Subscription {
            path: path.as_str().to_string(),
            sender,
        };

        self.subscriptions.write().insert(id, subscription);

        WatchHandle { id, receiver }
    }

    /// Unsubscribe and clean up. Safe to call with an already-removed id.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Send dropped event (best effort)
            let _ = sub.sender.try_send(CollectionEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Broadcast a snapshot to every subscriber of a path. Drops
    /// subscribers that fail to receive.
    pub fn broadcast_snapshot(&self, path: &CollectionPath, records: Vec<Document>) {
        let event = CollectionEvent::Snapshot { records };
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.path == path.as_str() && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.sender.try_send(CollectionEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }

    /// Send an event directly to one subscription (registration snapshot).
    /// Returns false if the subscription was dropped.
    pub fn send_to(&self, id: SubscriptionId, event: CollectionEvent) -> bool {
        let subs = self.subscriptions.read();
        if let Some(sub) = subs.get(&id) {
            sub.try_send(event)
        } else {
            false
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
