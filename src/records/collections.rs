//! Nested document collections with optional on-disk persistence.
//!
//! Collections are keyed by [`CollectionPath`] and keep documents in
//! insertion order (ids are assigned monotonically, so id order is
//! insertion order). In durable mode every collection is mirrored to a
//! MessagePack file; the file is written before the in-memory commit so a
//! failed write leaves memory, disk, and watchers at the previous state.

use crate::error::{Result, StoreError};
use crate::types::{CollectionPath, Document, NewDocument, RecordId, Timestamp};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File extension for persisted collections.
const COLLECTION_EXT: &str = "col";

type Collection = BTreeMap<RecordId, Document>;

/// The set of all document collections in a store.
#[derive(Debug)]
pub struct CollectionSet {
    collections: RwLock<HashMap<String, Collection>>,
    /// Root directory for persisted collections (None = memory only).
    data_dir: Option<PathBuf>,
}

impl CollectionSet {
    /// Create an empty, memory-only collection set.
    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            data_dir: None,
        }
    }

    /// Open a durable collection set, loading every persisted collection.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let mut collections = HashMap::new();
        Self::load_dir(&data_dir, &mut Vec::new(), &mut collections)?;

        Ok(Self {
            collections: RwLock::new(collections),
            data_dir: Some(data_dir),
        })
    }

    /// Highest record id seen across all collections (0 when empty).
    /// Used on open so new ids continue after persisted ones.
    pub fn max_record_id(&self) -> u64 {
        self.collections
            .read()
            .values()
            .flat_map(|col| col.keys())
            .map(|id| id.0)
            .max()
            .unwrap_or(0)
    }

    /// Insert a document with a store-assigned id, stamping `created_at`.
    /// Returns the full post-commit snapshot of the collection.
    pub fn insert(
        &self,
        path: &CollectionPath,
        id: RecordId,
        new: NewDocument,
    ) -> Result<Vec<Document>> {
        let doc = Document {
            id,
            created_at: Timestamp::now(),
            updated_at: None,
            image_url: new.image_url,
            owner: new.owner,
            fields: new.fields,
        };

        let mut cols = self.collections.write();
        let col = cols.entry(path.as_str().to_string()).or_default();

        let mut candidate = col.clone();
        candidate.insert(id, doc);
        self.persist(path, &candidate)?;

        *col = candidate;
        Ok(col.values().cloned().collect())
    }

    /// Delete a document. Deleting an absent id is a no-op; `None` means
    /// nothing changed (no snapshot to broadcast).
    pub fn delete(&self, path: &CollectionPath, id: RecordId) -> Result<Option<Vec<Document>>> {
        let mut cols = self.collections.write();
        let Some(col) = cols.get_mut(path.as_str()) else {
            return Ok(None);
        };
        if !col.contains_key(&id) {
            return Ok(None);
        }

        let mut candidate = col.clone();
        candidate.remove(&id);
        self.persist(path, &candidate)?;

        *col = candidate;
        Ok(Some(col.values().cloned().collect()))
    }

    /// Merge partial fields into a document and stamp `updated_at`.
    /// The envelope (`id`, `created_at`, `image_url`, `owner`) is untouched.
    pub fn patch(
        &self,
        path: &CollectionPath,
        id: RecordId,
        partial: Map<String, Value>,
    ) -> Result<Vec<Document>> {
        let mut cols = self.collections.write();
        let col = cols
            .get_mut(path.as_str())
            .ok_or(StoreError::RecordNotFound(id))?;
        if !col.contains_key(&id) {
            return Err(StoreError::RecordNotFound(id));
        }

        let mut candidate = col.clone();
        {
            let doc = candidate.get_mut(&id).expect("checked above");
            for (key, value) in partial {
                doc.fields.insert(key, value);
            }
            doc.updated_at = Some(Timestamp::now());
        }
        self.persist(path, &candidate)?;

        *col = candidate;
        Ok(col.values().cloned().collect())
    }

    /// Point-in-time read of one document.
    pub fn read(&self, path: &CollectionPath, id: RecordId) -> Option<Document> {
        self.collections
            .read()
            .get(path.as_str())
            .and_then(|col| col.get(&id).cloned())
    }

    /// Full contents of a collection in insertion order.
    pub fn list(&self, path: &CollectionPath) -> Vec<Document> {
        self.collections
            .read()
            .get(path.as_str())
            .map(|col| col.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty collections.
    pub fn collection_count(&self) -> u64 {
        self.collections
            .read()
            .values()
            .filter(|col| !col.is_empty())
            .count() as u64
    }

    /// Total number of documents across all collections.
    pub fn record_count(&self) -> u64 {
        self.collections
            .read()
            .values()
            .map(|col| col.len() as u64)
            .sum()
    }

    // --- Persistence ---

    fn persist(&self, path: &CollectionPath, col: &Collection) -> Result<()> {
        let Some(data_dir) = &self.data_dir else {
            return Ok(());
        };

        let segments: Vec<&str> = path.segments().collect();
        let (last, parents) = segments.split_last().expect("paths are never empty");
        let mut file_path = data_dir.clone();
        for segment in parents {
            file_path.push(segment);
        }
        file_path.push(format!("{last}.{COLLECTION_EXT}"));

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let docs: Vec<&Document> = col.values().collect();
        let encoded = rmp_serde::to_vec(&docs)?;

        let mut file = File::create(&file_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        Ok(())
    }

    fn load_dir(
        dir: &Path,
        segments: &mut Vec<String>,
        out: &mut HashMap<String, Collection>,
    ) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type()?.is_dir() {
                segments.push(name);
                Self::load_dir(&entry.path(), segments, out)?;
                segments.pop();
                continue;
            }

            let Some(stem) = name.strip_suffix(&format!(".{COLLECTION_EXT}")) else {
                continue;
            };

            segments.push(stem.to_string());
            let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
            let path = CollectionPath::from_segments(&refs)?;
            segments.pop();

            let bytes = fs::read(entry.path())?;
            let docs: Vec<Document> = rmp_serde::from_slice(&bytes)?;
            let col: Collection = docs.into_iter().map(|d| (d.id, d)).collect();
            out.insert(path.as_str().to_string(), col);
        }
        Ok(())
    }
}
