//! Core types for the trip store.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a record within the store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the owner a scoped collection is isolated under.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        OwnerId(s.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        OwnerId(s)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_millis() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Hierarchical key identifying one sub-collection.
///
/// Either `trips/{tripId}/{sub}`, `users/{ownerId}/trips/{tripId}/{sub}`,
/// or the top-level `trips` registry. The path is fully determined by its
/// inputs and never changes for the lifetime of a bound collection.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// The top-level trip registry.
    pub fn trips() -> Self {
        CollectionPath("trips".to_string())
    }

    /// A sub-collection under one trip.
    pub fn trip_sub(trip_id: &str, sub: &str) -> Result<Self> {
        validate_segment(trip_id)?;
        validate_segment(sub)?;
        Ok(CollectionPath(format!("trips/{trip_id}/{sub}")))
    }

    /// A sub-collection under one trip, isolated under its owner.
    pub fn user_trip_sub(owner: &OwnerId, trip_id: &str, sub: &str) -> Result<Self> {
        validate_segment(owner.as_str())?;
        validate_segment(trip_id)?;
        validate_segment(sub)?;
        Ok(CollectionPath(format!(
            "users/{}/trips/{trip_id}/{sub}",
            owner.as_str()
        )))
    }

    /// Parse a path previously produced by this type (used when reloading
    /// persisted collections from disk).
    pub(crate) fn from_segments(segments: &[&str]) -> Result<Self> {
        if segments.is_empty() {
            return Err(StoreError::InvalidPath("empty path".to_string()));
        }
        for seg in segments {
            validate_segment(seg)?;
        }
        Ok(CollectionPath(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Debug for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionPath({})", self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate one path segment (trip id, sub-resource name, owner id).
pub(crate) fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(StoreError::InvalidPath("empty segment".to_string()));
    }
    if segment == "." || segment == ".." {
        return Err(StoreError::InvalidPath(format!(
            "reserved segment: {segment}"
        )));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(StoreError::InvalidPath(format!(
            "segment contains separator: {segment}"
        )));
    }
    Ok(())
}

/// A stored document: the schemaless domain fields plus the envelope the
/// store manages (`id`, timestamps, attachment URL, owner tag).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (assigned by store).
    pub id: RecordId,

    /// When the document was created (assigned by store, immutable).
    pub created_at: Timestamp,

    /// When the document was last patched, if ever.
    pub updated_at: Option<Timestamp>,

    /// URL of the co-located attachment, if one was uploaded.
    pub image_url: Option<String>,

    /// Owner tag for identity-scoped collections.
    pub owner: Option<OwnerId>,

    /// Application-defined fields.
    pub fields: Map<String, Value>,
}

/// Input for creating a new document (before id/created_at are assigned).
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub fields: Map<String, Value>,
    pub image_url: Option<String>,
    pub owner: Option<OwnerId>,
}

impl NewDocument {
    /// Build from any serializable value. The value must serialize to a
    /// JSON object; anything else cannot be stored as a document.
    pub fn from_data<T: Serialize>(data: &T) -> Result<Self> {
        Ok(Self {
            fields: fields_of(data)?,
            image_url: None,
            owner: None,
        })
    }

    pub fn with_image_url(mut self, url: Option<String>) -> Self {
        self.image_url = url;
        self
    }

    pub fn with_owner(mut self, owner: Option<OwnerId>) -> Self {
        self.owner = owner;
        self
    }
}

/// Serialize a value into document fields, rejecting non-objects.
pub(crate) fn fields_of<T: Serialize>(data: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(data)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "document data must be an object, got {other}"
        ))),
    }
}

/// A typed view of a stored document.
#[derive(Clone, Debug)]
pub struct Record<T> {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
    pub image_url: Option<String>,
    pub owner: Option<OwnerId>,
    pub data: T,
}

impl<T: DeserializeOwned> Record<T> {
    /// Decode a raw document into its typed form.
    pub fn from_document(doc: Document) -> Result<Self> {
        let data = serde_json::from_value(Value::Object(doc.fields))
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;
        Ok(Self {
            id: doc.id,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            image_url: doc.image_url,
            owner: doc.owner,
            data,
        })
    }
}

/// A file supplied alongside `add` for upload into blob storage.
#[derive(Clone, Debug)]
pub struct AttachmentFile {
    /// Original file name (becomes the tail of the storage path).
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl AttachmentFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// A stored attachment read back from blob storage.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub url: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub collection_count: u64,
    pub record_count: u64,
    pub attachment_count: u64,
    pub attachment_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_sub_path() {
        let path = CollectionPath::trip_sub("trip-42", "tickets").unwrap();
        assert_eq!(path.as_str(), "trips/trip-42/tickets");
    }

    #[test]
    fn test_user_trip_sub_path() {
        let owner = OwnerId::from("user-7");
        let path = CollectionPath::user_trip_sub(&owner, "trip-42", "stays").unwrap();
        assert_eq!(path.as_str(), "users/user-7/trips/trip-42/stays");
    }

    #[test]
    fn test_path_rejects_empty_segment() {
        assert!(CollectionPath::trip_sub("", "tickets").is_err());
        assert!(CollectionPath::trip_sub("trip-42", "").is_err());
    }

    #[test]
    fn test_path_rejects_separators_and_dots() {
        assert!(CollectionPath::trip_sub("a/b", "tickets").is_err());
        assert!(CollectionPath::trip_sub("a\\b", "tickets").is_err());
        assert!(CollectionPath::trip_sub("..", "tickets").is_err());
    }

    #[test]
    fn test_new_document_requires_object() {
        let err = NewDocument::from_data(&42).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_record_from_document() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct City {
            name: String,
        }

        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String("Rome".to_string()));

        let doc = Document {
            id: RecordId(3),
            created_at: Timestamp(1000),
            updated_at: None,
            image_url: None,
            owner: None,
            fields,
        };

        let record: Record<City> = Record::from_document(doc).unwrap();
        assert_eq!(record.id, RecordId(3));
        assert_eq!(record.data, City { name: "Rome".into() });
    }

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b >= a);
    }
}
