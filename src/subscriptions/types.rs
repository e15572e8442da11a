//! Subscription types for live collection updates.

use crate::types::Document;
use crossbeam_channel::Receiver;

/// Events delivered to a collection watcher.
///
/// Every committed mutation re-delivers the full current record set rather
/// than a diff, so consumers always replace their local copy wholesale.
#[derive(Clone, Debug)]
pub enum CollectionEvent {
    /// The full current contents of the watched collection, in insertion
    /// order as kept by the store.
    Snapshot { records: Vec<Document> },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to a raw document subscription.
///
/// Dropping the handle alone does not unregister the subscription; call
/// [`crate::Store::unwatch`] (idempotent). The typed
/// [`crate::collections::Watch`] wrapper does this automatically on drop.
pub struct WatchHandle {
    pub id: SubscriptionId,
    /// Channel on which snapshots arrive.
    pub receiver: Receiver<CollectionEvent>,
}

impl WatchHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<CollectionEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<CollectionEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<CollectionEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
