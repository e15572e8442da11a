//! Attachment (blob) storage implementation.
//!
//! Attachments are addressed by the storage path they were uploaded under
//! (`{sub}/{tripId}/{millis}-{fileName}`) and referenced from documents via
//! an opaque `blob://` URL that maps back to that path for deletion.

use crate::error::{Result, StoreError};
use crate::types::{validate_segment, Attachment};
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Magic bytes for attachment files.
const ATTACHMENT_MAGIC: &[u8; 4] = b"ATT\0";

/// Current attachment format version.
const ATTACHMENT_VERSION: u8 = 1;

/// URL scheme for stored attachments.
const URL_SCHEME: &str = "blob://";

/// Cached attachment data (content + content_type).
#[derive(Clone)]
struct CachedBlob {
    content: Vec<u8>,
    content_type: String,
}

/// Path-addressed attachment storage.
#[derive(Debug)]
pub struct BlobStorage {
    /// Base directory for attachments.
    path: PathBuf,

    /// LRU cache for recently accessed attachments.
    cache: Mutex<LruCache<String, CachedBlob>>,
}

impl BlobStorage {
    /// Create a new attachment storage at the given path.
    pub fn new(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap();

        Ok(Self {
            path,
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    /// Store an attachment under a storage path, returning its URL.
    ///
    /// Storing to an already-used path overwrites the previous content;
    /// upload paths include a wall-clock component, so this only happens
    /// for identically-named files in the same millisecond.
    pub fn put(&self, blob_path: &str, content: &[u8], content_type: &str) -> Result<String> {
        let file_path = self.file_path(blob_path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&file_path)?;

        // Write header
        file.write_all(ATTACHMENT_MAGIC)?;
        file.write_all(&[ATTACHMENT_VERSION])?;

        // Write content type
        let content_type_bytes = content_type.as_bytes();
        let content_type_len = content_type_bytes.len() as u16;
        file.write_all(&content_type_len.to_le_bytes())?;
        file.write_all(content_type_bytes)?;

        // Write content
        let content_len = content.len() as u64;
        file.write_all(&content_len.to_le_bytes())?;
        file.write_all(content)?;

        // Write checksum
        let checksum = crc32fast::hash(content);
        file.write_all(&checksum.to_le_bytes())?;

        file.sync_all()?;

        self.cache.lock().put(
            blob_path.to_string(),
            CachedBlob {
                content: content.to_vec(),
                content_type: content_type.to_string(),
            },
        );

        Ok(Self::url_for(blob_path))
    }

    /// Get an attachment by its URL.
    pub fn get(&self, url: &str) -> Result<Option<Attachment>> {
        let blob_path = Self::path_from_url(url)?;

        if let Some(cached) = self.cache.lock().get(&blob_path).cloned() {
            return Ok(Some(Attachment {
                url: url.to_string(),
                content: cached.content,
                content_type: cached.content_type,
            }));
        }

        let file_path = self.file_path(&blob_path)?;
        if !file_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&file_path)?;

        // Read and verify magic
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != ATTACHMENT_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid attachment magic".into()));
        }

        // Read version
        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != ATTACHMENT_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported attachment version: {}",
                version[0]
            )));
        }

        // Read content type
        let mut content_type_len_bytes = [0u8; 2];
        file.read_exact(&mut content_type_len_bytes)?;
        let content_type_len = u16::from_le_bytes(content_type_len_bytes) as usize;

        let mut content_type_bytes = vec![0u8; content_type_len];
        file.read_exact(&mut content_type_bytes)?;
        let content_type = String::from_utf8_lossy(&content_type_bytes).into_owned();

        // Read content
        let mut content_len_bytes = [0u8; 8];
        file.read_exact(&mut content_len_bytes)?;
        let content_len = u64::from_le_bytes(content_len_bytes) as usize;

        let mut content = vec![0u8; content_len];
        file.read_exact(&mut content)?;

        // Read and verify checksum
        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&content);

        if stored_checksum != computed_checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        self.cache.lock().put(
            blob_path,
            CachedBlob {
                content: content.clone(),
                content_type: content_type.clone(),
            },
        );

        Ok(Some(Attachment {
            url: url.to_string(),
            content,
            content_type,
        }))
    }

    /// Check if an attachment exists.
    pub fn exists(&self, url: &str) -> bool {
        let Ok(blob_path) = Self::path_from_url(url) else {
            return false;
        };
        if self.cache.lock().contains(&blob_path) {
            return true;
        }
        self.file_path(&blob_path)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Delete an attachment. Returns false if it was already gone.
    pub fn remove(&self, url: &str) -> Result<bool> {
        let blob_path = Self::path_from_url(url)?;
        self.cache.lock().pop(&blob_path);

        let file_path = self.file_path(&blob_path)?;
        if file_path.exists() {
            fs::remove_file(&file_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// List all stored attachment URLs.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        Self::walk(&self.path, &mut |rel| paths.push(Self::url_for(rel)))?;
        Ok(paths)
    }

    /// Get total size of all attachment files.
    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0u64;
        let base = self.path.clone();
        Self::walk(&self.path, &mut |rel| {
            if let Ok(meta) = fs::metadata(base.join(rel)) {
                total += meta.len();
            }
        })?;
        Ok(total)
    }

    /// The URL under which a storage path is addressable.
    pub fn url_for(blob_path: &str) -> String {
        format!("{URL_SCHEME}{blob_path}")
    }

    /// Map a URL back to its storage path.
    fn path_from_url(url: &str) -> Result<String> {
        url.strip_prefix(URL_SCHEME)
            .map(|p| p.to_string())
            .ok_or_else(|| StoreError::InvalidUrl(url.to_string()))
    }

    /// Resolve and validate the on-disk location for a storage path.
    fn file_path(&self, blob_path: &str) -> Result<PathBuf> {
        let mut out = self.path.clone();
        for segment in blob_path.split('/') {
            validate_segment(segment)?;
            out.push(segment);
        }
        Ok(out)
    }

    /// Walk all attachment files, invoking `f` with each relative path.
    fn walk(dir: &Path, f: &mut impl FnMut(&str)) -> Result<()> {
        fn inner(dir: &Path, prefix: &str, f: &mut impl FnMut(&str)) -> Result<()> {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let rel = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}/{name}")
                };
                if entry.file_type()?.is_dir() {
                    inner(&entry.path(), &rel, f)?;
                } else {
                    f(&rel);
                }
            }
            Ok(())
        }
        inner(dir, "", f)
    }
}
