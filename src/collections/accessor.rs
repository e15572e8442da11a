//! The generic per-trip sub-collection accessor.
//!
//! One [`Collection`] instance binds CRUD and watch operations to a single
//! sub-collection path, optionally isolated under the signed-in owner and
//! optionally attachment-capable. Instances are cheap, hold no record
//! state of their own, and can be recreated freely: two accessors on the
//! same path always observe the same underlying records.

use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::subscriptions::{CollectionEvent, SubscriptionId, WatchHandle};
use crate::types::{
    fields_of, validate_segment, AttachmentFile, CollectionPath, NewDocument, OwnerId, Record,
    RecordId, Timestamp,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::warn;

/// A bound CRUD + watch accessor for one sub-collection.
#[derive(Debug)]
pub struct Collection<'s, T> {
    store: &'s Store,
    path: CollectionPath,
    trip_id: String,
    sub: String,
    /// Identity captured at construction time; stays fixed for the
    /// accessor's lifetime even if the owner signs out afterwards.
    owner: Option<OwnerId>,
    attachments: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T> Collection<'s, T> {
    /// Bind to `trips/{tripId}/{sub}` with no owner segment.
    pub(crate) fn unscoped(
        store: &'s Store,
        trip_id: &str,
        sub: &str,
        attachments: bool,
    ) -> Result<Self> {
        if attachments && !store.has_attachments() {
            return Err(StoreError::AttachmentsUnavailable);
        }
        Ok(Self {
            store,
            path: CollectionPath::trip_sub(trip_id, sub)?,
            trip_id: trip_id.to_string(),
            sub: sub.to_string(),
            owner: None,
            attachments,
            _marker: PhantomData,
        })
    }

    /// Bind to `users/{ownerId}/trips/{tripId}/{sub}`.
    ///
    /// Fails with [`StoreError::NotAuthenticated`] before touching the
    /// record store when no identity is currently resolved.
    pub(crate) fn scoped(
        store: &'s Store,
        trip_id: &str,
        sub: &str,
        attachments: bool,
    ) -> Result<Self> {
        let owner = store
            .current_identity()
            .ok_or(StoreError::NotAuthenticated)?;
        if attachments && !store.has_attachments() {
            return Err(StoreError::AttachmentsUnavailable);
        }
        Ok(Self {
            store,
            path: CollectionPath::user_trip_sub(&owner, trip_id, sub)?,
            trip_id: trip_id.to_string(),
            sub: sub.to_string(),
            owner: Some(owner),
            attachments,
            _marker: PhantomData,
        })
    }

    /// The bound collection path.
    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// Register a live watcher on the bound path.
    ///
    /// The first snapshot (the current contents) is delivered immediately;
    /// every committed mutation on the path, from this accessor or any
    /// other sharing it, re-delivers the full record set. The returned
    /// handle unsubscribes on drop.
    pub fn watch(&self) -> Watch<'s, T> {
        Watch::new(self.store, self.store.watch_documents(&self.path))
    }

    /// Delete a record, cleaning up its attachment first.
    ///
    /// The attachment delete is best-effort and strictly precedes the
    /// record delete: a missing or failing blob never blocks removal of
    /// the record. Deleting an absent id is a no-op.
    pub fn del(&self, id: RecordId, image_url: Option<&str>) -> Result<()> {
        if self.attachments {
            if let Some(url) = image_url {
                match self.store.remove_attachment(url) {
                    Ok(true) => {}
                    Ok(false) => warn!(url, "attachment already gone, removing record anyway"),
                    Err(e) => warn!(url, error = %e, "attachment delete failed, removing record anyway"),
                }
            }
        }
        self.store.delete(&self.path, id)
    }
}

impl<'s, T: Serialize> Collection<'s, T> {
    /// Create a record, optionally uploading an attachment first.
    ///
    /// With attachments enabled and a file supplied, the file is stored
    /// under `{sub}/{tripId}/{millis}-{fileName}` and the resolved URL is
    /// persisted on the record; an upload failure aborts the whole add.
    /// With attachments disabled the file is ignored and blob storage is
    /// never touched. A failed insert does not clean up an already
    /// uploaded file.
    pub fn add(&self, data: &T, file: Option<&AttachmentFile>) -> Result<RecordId> {
        let fields = fields_of(data)?;

        let image_url = match file {
            Some(file) if self.attachments => {
                validate_segment(&file.name)?;
                let blob_path = format!(
                    "{}/{}/{}-{}",
                    self.sub,
                    self.trip_id,
                    Timestamp::now().0,
                    file.name
                );
                Some(
                    self.store
                        .put_attachment(&blob_path, &file.bytes, &file.content_type)?,
                )
            }
            _ => None,
        };

        let new = NewDocument {
            fields,
            image_url,
            owner: self.owner.clone(),
        };
        self.store.insert(&self.path, new)
    }

    /// Merge partial domain fields into a record, stamping `updated_at`.
    ///
    /// `created_at` and `image_url` are store-managed and never touched.
    /// Last writer wins; there is no version check.
    pub fn update<P: Serialize>(&self, id: RecordId, partial: &P) -> Result<()> {
        self.store.patch(&self.path, id, fields_of(partial)?)
    }
}

impl<'s, T: DeserializeOwned> Collection<'s, T> {
    /// Point-in-time read of one record. `Ok(None)` when absent.
    pub fn get(&self, id: RecordId) -> Result<Option<Record<T>>> {
        self.store
            .read(&self.path, id)
            .map(Record::from_document)
            .transpose()
    }
}

/// A typed live watcher over one collection path.
///
/// Wraps the raw [`WatchHandle`]: snapshots arrive as `Vec<Record<T>>` in
/// insertion order. Unsubscribes on drop; explicit [`Watch::unsubscribe`]
/// is idempotent.
pub struct Watch<'s, T> {
    store: &'s Store,
    handle: WatchHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T> Watch<'s, T> {
    pub(crate) fn new(store: &'s Store, handle: WatchHandle) -> Self {
        Self {
            store,
            handle,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.handle.id
    }

    /// Stop delivery and release the channel. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        self.store.unwatch(self.handle.id);
    }
}

impl<'s, T: DeserializeOwned> Watch<'s, T> {
    /// Receive the next snapshot (blocking).
    pub fn recv(&self) -> Result<Vec<Record<T>>> {
        match self.handle.recv() {
            Ok(event) => Self::decode(event),
            Err(_) => Err(StoreError::SubscriptionDropped),
        }
    }

    /// Receive the next snapshot without blocking. `Ok(None)` when no
    /// snapshot is pending.
    pub fn try_recv(&self) -> Result<Option<Vec<Record<T>>>> {
        match self.handle.try_recv() {
            Ok(event) => Self::decode(event).map(Some),
            Err(crossbeam_channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                Err(StoreError::SubscriptionDropped)
            }
        }
    }

    /// Receive the next snapshot, waiting at most `timeout`. `Ok(None)` on
    /// timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<Record<T>>>> {
        match self.handle.recv_timeout(timeout) {
            Ok(event) => Self::decode(event).map(Some),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(StoreError::SubscriptionDropped)
            }
        }
    }

    fn decode(event: CollectionEvent) -> Result<Vec<Record<T>>> {
        match event {
            CollectionEvent::Snapshot { records } => {
                records.into_iter().map(Record::from_document).collect()
            }
            CollectionEvent::Dropped { .. } => Err(StoreError::SubscriptionDropped),
        }
    }
}

impl<'s, T> Drop for Watch<'s, T> {
    fn drop(&mut self) {
        self.store.unwatch(self.handle.id);
    }
}
