//! Error handling tests: construction preconditions, best-effort
//! attachment cleanup, and store lifecycle failures.

use std::fs;
use tempfile::TempDir;
use tripstore::resources::{sub, FlightTicket, Stay, TripCity};
use tripstore::{AttachmentFile, Store, StoreConfig, StoreError};

fn durable_store(dir: &TempDir) -> Store {
    Store::open_or_create(StoreConfig {
        path: Some(dir.path().join("store")),
        ..Default::default()
    })
    .unwrap()
}

fn ticket() -> FlightTicket {
    FlightTicket {
        airline: "ITA".into(),
        from: "FCO".into(),
        to: "JFK".into(),
        date: "2025-06-01".into(),
        time: "10:00".into(),
        price: 450.0,
    }
}

#[test]
fn test_scoped_construction_requires_identity() {
    let store = Store::in_memory();

    // Nobody signed in: construction fails before any store call, and
    // nothing is written anywhere.
    let err = store
        .user_trip_collection::<Stay>("trip-42", sub::STAYS, false)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotAuthenticated));
    assert_eq!(store.stats().unwrap().record_count, 0);

    // Signing in afterwards makes construction succeed.
    store.sign_in("user-7");
    assert!(store
        .user_trip_collection::<Stay>("trip-42", sub::STAYS, false)
        .is_ok());
}

#[test]
fn test_attachment_disabled_accessor_never_uploads() {
    // Memory mode has no blob storage at all, so any attempt to upload
    // would fail loudly; a disabled accessor must not even try.
    let store = Store::in_memory();
    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, false)
        .unwrap();

    let file = AttachmentFile::new("scan.jpg", "image/jpeg", b"bytes".to_vec());
    let id = tickets.add(&ticket(), Some(&file)).unwrap();

    let record = tickets.get(id).unwrap().unwrap();
    assert_eq!(record.image_url, None);
}

#[test]
fn test_attachment_enabled_needs_blob_storage() {
    let store = Store::in_memory();
    let err = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, true)
        .unwrap_err();
    assert!(matches!(err, StoreError::AttachmentsUnavailable));
}

#[test]
fn test_del_with_missing_blob_still_removes_record() {
    let dir = TempDir::new().unwrap();
    let store = durable_store(&dir);

    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, true)
        .unwrap();

    let file = AttachmentFile::new("scan.jpg", "image/jpeg", b"bytes".to_vec());
    let id = tickets.add(&ticket(), Some(&file)).unwrap();
    let url = tickets.get(id).unwrap().unwrap().image_url.unwrap();

    // Blob vanishes out from under the record.
    assert!(store.remove_attachment(&url).unwrap());

    // Best-effort cleanup: the record still goes away.
    tickets.del(id, Some(&url)).unwrap();
    assert!(tickets.get(id).unwrap().is_none());
}

#[test]
fn test_del_with_foreign_url_still_removes_record() {
    let dir = TempDir::new().unwrap();
    let store = durable_store(&dir);

    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, true)
        .unwrap();
    let id = tickets.add(&ticket(), None).unwrap();

    // A URL the blob store cannot even parse is swallowed too.
    tickets
        .del(id, Some("https://example.com/external.png"))
        .unwrap();
    assert!(tickets.get(id).unwrap().is_none());
}

#[test]
fn test_update_missing_record() {
    let store = Store::in_memory();
    let cities = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    let err = cities
        .update(tripstore::RecordId(404), &serde_json::json!({ "name": "x" }))
        .unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound(_)));
}

#[test]
fn test_get_missing_record_is_none() {
    let store = Store::in_memory();
    let cities = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();
    assert!(cities.get(tripstore::RecordId(404)).unwrap().is_none());
}

#[test]
fn test_invalid_path_segments_rejected() {
    let store = Store::in_memory();

    assert!(matches!(
        store
            .trip_collection::<TripCity>("", sub::CITIES, false)
            .unwrap_err(),
        StoreError::InvalidPath(_)
    ));
    assert!(matches!(
        store
            .trip_collection::<TripCity>("trip-1", "a/b", false)
            .unwrap_err(),
        StoreError::InvalidPath(_)
    ));
    assert!(matches!(
        store
            .trip_collection::<TripCity>("..", sub::CITIES, false)
            .unwrap_err(),
        StoreError::InvalidPath(_)
    ));
}

#[test]
fn test_add_rejects_file_name_with_separator() {
    let dir = TempDir::new().unwrap();
    let store = durable_store(&dir);

    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, true)
        .unwrap();

    let file = AttachmentFile::new("../../escape.jpg", "image/jpeg", b"bytes".to_vec());
    let err = tickets.add(&ticket(), Some(&file)).unwrap_err();
    assert!(matches!(err, StoreError::InvalidPath(_)));

    // The failed upload aborted the whole add: no record was created.
    assert_eq!(store.stats().unwrap().record_count, 0);
}

#[test]
fn test_corrupted_manifest_refuses_to_open() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("store");

    {
        let _store = Store::open_or_create(StoreConfig {
            path: Some(root.clone()),
            ..Default::default()
        })
        .unwrap();
    }

    fs::write(root.join("MANIFEST"), b"BOGUS").unwrap();

    let err = Store::open_or_create(StoreConfig {
        path: Some(root),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidFormat(_)));
}

#[test]
fn test_dropped_watcher_channel_reports_dropped() {
    let store = Store::in_memory();
    let cities = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    let watch = cities.watch();
    watch.unsubscribe();

    // Registration snapshot, then the drop notification.
    assert!(watch.recv().is_ok());
    assert!(matches!(watch.recv(), Err(StoreError::SubscriptionDropped)));
}
