//! Main Store struct tying all components together.

use crate::blobs::BlobStorage;
use crate::collections::resources::Trip;
use crate::collections::{Collection, Watch};
use crate::error::{Result, StoreError};
use crate::identity::IdentityProvider;
use crate::records::CollectionSet;
use crate::subscriptions::{CollectionEvent, SubscriptionId, SubscriptionManager, WatchHandle};
use crate::types::{
    fields_of, Attachment, CollectionPath, Document, NewDocument, OwnerId, Record, RecordId,
    StoreStats,
};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base path for the store. `None` keeps everything in memory (mock
    /// mode); attachments are then unavailable.
    pub path: Option<PathBuf>,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Attachment cache size (number of attachments).
    pub blob_cache_size: usize,

    /// Buffered snapshots per watcher before the watcher is dropped.
    pub watch_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            blob_cache_size: 1000,
            watch_buffer: 64,
        }
    }
}

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"TRP\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// The trip document store.
///
/// Provides a unified interface for:
/// - Document collections keyed by trip/sub-resource paths
/// - Live full-snapshot watchers per collection
/// - Attachment upload co-located with record creation
/// - Identity-scoped accessor construction
/// - The top-level trip registry
#[derive(Debug)]
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Lock file for exclusive access (durable mode only).
    _lock_file: Option<File>,

    /// Document collections.
    collections: CollectionSet,

    /// Attachment storage (durable mode only).
    blobs: Option<BlobStorage>,

    /// Ownership scoping.
    identity: IdentityProvider,

    /// Snapshot watchers.
    subscriptions: SubscriptionManager,

    /// Next record id.
    next_id: AtomicU64,

    /// Lock serializing commit + broadcast so watchers observe writes in
    /// commit order.
    write_lock: Mutex<()>,
}

impl Store {
    /// Create a memory-only store (mock mode).
    pub fn in_memory() -> Self {
        Self {
            config: StoreConfig::default(),
            _lock_file: None,
            collections: CollectionSet::in_memory(),
            blobs: None,
            identity: IdentityProvider::new(),
            subscriptions: SubscriptionManager::new(),
            next_id: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        let Some(path) = config.path.clone() else {
            return Ok(Self {
                config,
                ..Self::in_memory()
            });
        };

        if path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new durable store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        let root = config
            .path
            .clone()
            .ok_or_else(|| StoreError::InvalidFormat("durable store requires a path".into()))?;

        // Create directory structure
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join("data"))?;

        // Write manifest
        Self::write_manifest(&root)?;

        // Acquire lock
        let lock_file = Self::acquire_lock(&root)?;

        // Initialize components
        let collections = CollectionSet::open(root.join("data"))?;
        let blobs = BlobStorage::new(root.join("attachments"), config.blob_cache_size)?;
        let next_id = collections.max_record_id() + 1;

        debug!(path = %root.display(), "created store");

        Ok(Self {
            config,
            _lock_file: Some(lock_file),
            collections,
            blobs: Some(blobs),
            identity: IdentityProvider::new(),
            subscriptions: SubscriptionManager::new(),
            next_id: AtomicU64::new(next_id),
            write_lock: Mutex::new(()),
        })
    }

    /// Open an existing durable store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let root = config
            .path
            .clone()
            .ok_or_else(|| StoreError::InvalidFormat("durable store requires a path".into()))?;

        // Verify manifest
        Self::verify_manifest(&root)?;

        // Acquire lock
        let lock_file = Self::acquire_lock(&root)?;

        // Open components
        let collections = CollectionSet::open(root.join("data"))?;
        let blobs = BlobStorage::new(root.join("attachments"), config.blob_cache_size)?;

        // Ids continue after the highest persisted one
        let next_id = collections.max_record_id() + 1;

        debug!(path = %root.display(), next_id, "opened store");

        Ok(Self {
            config,
            _lock_file: Some(lock_file),
            collections,
            blobs: Some(blobs),
            identity: IdentityProvider::new(),
            subscriptions: SubscriptionManager::new(),
            next_id: AtomicU64::new(next_id),
            write_lock: Mutex::new(()),
        })
    }

    fn write_manifest(root: &Path) -> Result<()> {
        let mut file = File::create(root.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(root: &Path) -> Result<()> {
        let manifest_path = root.join("MANIFEST");
        if !manifest_path.exists() {
            return Err(StoreError::NotInitialized);
        }

        let mut file = File::open(manifest_path)?;
        let mut header = [0u8; 5];
        file.read_exact(&mut header)?;

        if &header[0..4] != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }
        if header[4] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                header[4]
            )));
        }
        Ok(())
    }

    fn acquire_lock(root: &Path) -> Result<File> {
        let lock_file = File::create(root.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }

    // --- Document Operations ---

    /// Insert a document, assigning its id and `created_at`. The committed
    /// snapshot is pushed to every watcher of the path before returning.
    pub fn insert(&self, path: &CollectionPath, new: NewDocument) -> Result<RecordId> {
        let _lock = self.write_lock.lock();

        let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let snapshot = self.collections.insert(path, id, new)?;
        self.subscriptions.broadcast_snapshot(path, snapshot);
        Ok(id)
    }

    /// Merge partial fields into a document, stamping `updated_at`.
    pub fn patch(
        &self,
        path: &CollectionPath,
        id: RecordId,
        partial: Map<String, Value>,
    ) -> Result<()> {
        let _lock = self.write_lock.lock();

        let snapshot = self.collections.patch(path, id, partial)?;
        self.subscriptions.broadcast_snapshot(path, snapshot);
        Ok(())
    }

    /// Delete a document. Deleting an absent id is a no-op and pushes no
    /// snapshot.
    pub fn delete(&self, path: &CollectionPath, id: RecordId) -> Result<()> {
        let _lock = self.write_lock.lock();

        if let Some(snapshot) = self.collections.delete(path, id)? {
            self.subscriptions.broadcast_snapshot(path, snapshot);
        }
        Ok(())
    }

    /// Point-in-time read of one document.
    pub fn read(&self, path: &CollectionPath, id: RecordId) -> Option<Document> {
        self.collections.read(path, id)
    }

    /// Full contents of a collection in insertion order.
    pub fn list(&self, path: &CollectionPath) -> Vec<Document> {
        self.collections.list(path)
    }

    /// Register a raw watcher on a collection path.
    ///
    /// Registration and the initial snapshot happen under the write lock,
    /// so the watcher misses no committed change and sees no duplicate.
    pub fn watch_documents(&self, path: &CollectionPath) -> WatchHandle {
        let _lock = self.write_lock.lock();

        let handle = self.subscriptions.subscribe(path, self.config.watch_buffer);
        let records = self.collections.list(path);
        self.subscriptions
            .send_to(handle.id, CollectionEvent::Snapshot { records });
        handle
    }

    /// Unregister a watcher. Safe to call repeatedly.
    pub fn unwatch(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    // --- Attachment Operations ---

    /// Whether this store can hold attachments.
    pub fn has_attachments(&self) -> bool {
        self.blobs.is_some()
    }

    /// Store an attachment, returning its URL.
    pub fn put_attachment(
        &self,
        blob_path: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String> {
        self.blobs
            .as_ref()
            .ok_or(StoreError::AttachmentsUnavailable)?
            .put(blob_path, content, content_type)
    }

    /// Read an attachment back by its URL.
    pub fn get_attachment(&self, url: &str) -> Result<Option<Attachment>> {
        self.blobs
            .as_ref()
            .ok_or(StoreError::AttachmentsUnavailable)?
            .get(url)
    }

    /// Check whether an attachment exists.
    pub fn attachment_exists(&self, url: &str) -> bool {
        self.blobs
            .as_ref()
            .map(|b| b.exists(url))
            .unwrap_or(false)
    }

    /// Delete an attachment. Returns false if it was already gone.
    pub fn remove_attachment(&self, url: &str) -> Result<bool> {
        self.blobs
            .as_ref()
            .ok_or(StoreError::AttachmentsUnavailable)?
            .remove(url)
    }

    // --- Ownership Scoping ---

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    pub fn sign_in(&self, owner: impl Into<OwnerId>) {
        self.identity.sign_in(owner);
    }

    pub fn sign_out(&self) {
        self.identity.sign_out();
    }

    pub fn current_identity(&self) -> Option<OwnerId> {
        self.identity.current_identity()
    }

    // --- Accessor Factories ---

    /// Bind a generic accessor to `trips/{tripId}/{sub}`.
    pub fn trip_collection<T>(
        &self,
        trip_id: &str,
        sub: &str,
        attachments: bool,
    ) -> Result<Collection<'_, T>> {
        Collection::unscoped(self, trip_id, sub, attachments)
    }

    /// Bind a generic accessor to `users/{ownerId}/trips/{tripId}/{sub}`,
    /// resolving the owner once at construction. Fails with
    /// [`StoreError::NotAuthenticated`] when nobody is signed in.
    pub fn user_trip_collection<T>(
        &self,
        trip_id: &str,
        sub: &str,
        attachments: bool,
    ) -> Result<Collection<'_, T>> {
        Collection::scoped(self, trip_id, sub, attachments)
    }

    // --- Trip Registry ---

    /// Register a trip, tagging it with the current owner if one is
    /// signed in.
    pub fn add_trip(&self, trip: &Trip) -> Result<RecordId> {
        let new = NewDocument::from_data(trip)?.with_owner(self.current_identity());
        self.insert(&CollectionPath::trips(), new)
    }

    /// Merge partial fields into a registered trip.
    pub fn update_trip<P: Serialize>(&self, id: RecordId, partial: &P) -> Result<()> {
        self.patch(&CollectionPath::trips(), id, fields_of(partial)?)
    }

    /// Get a registered trip.
    pub fn trip(&self, id: RecordId) -> Result<Option<Record<Trip>>> {
        self.read(&CollectionPath::trips(), id)
            .map(Record::from_document)
            .transpose()
    }

    /// All registered trips in registration order.
    pub fn trips(&self) -> Result<Vec<Record<Trip>>> {
        self.list(&CollectionPath::trips())
            .into_iter()
            .map(Record::from_document)
            .collect()
    }

    /// Delete a trip. Sub-collections are not cascaded.
    pub fn delete_trip(&self, id: RecordId) -> Result<()> {
        self.delete(&CollectionPath::trips(), id)
    }

    /// Watch the trip registry.
    pub fn watch_trips(&self) -> Watch<'_, Trip> {
        Watch::new(self, self.watch_documents(&CollectionPath::trips()))
    }

    // --- Statistics ---

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let (attachment_count, attachment_size_bytes) = match &self.blobs {
            Some(blobs) => (blobs.list()?.len() as u64, blobs.total_size()?),
            None => (0, 0),
        };

        Ok(StoreStats {
            collection_count: self.collections.collection_count(),
            record_count: self.collections.record_count(),
            attachment_count,
            attachment_size_bytes,
        })
    }

    /// Typed decode of a whole collection (used by tests and callers that
    /// want a one-shot read instead of a watcher).
    pub fn list_as<T: DeserializeOwned>(&self, path: &CollectionPath) -> Result<Vec<Record<T>>> {
        self.list(path)
            .into_iter()
            .map(Record::from_document)
            .collect()
    }
}
