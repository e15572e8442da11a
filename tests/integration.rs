//! Integration tests for the trip store.

use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use tripstore::resources::{self, sub, FlightTicket, Stay, Trip, TripCity};
use tripstore::{AttachmentFile, RecordId, Store, StoreConfig};

const TIMEOUT: Duration = Duration::from_millis(200);

fn durable_store(dir: &TempDir) -> Store {
    Store::open_or_create(StoreConfig {
        path: Some(dir.path().join("store")),
        ..Default::default()
    })
    .unwrap()
}

fn ita_ticket() -> FlightTicket {
    FlightTicket {
        airline: "ITA".into(),
        from: "FCO".into(),
        to: "JFK".into(),
        date: "2025-06-01".into(),
        time: "10:00".into(),
        price: 450.0,
    }
}

// --- Realistic Workflow Tests ---

#[test]
fn test_ticket_lifecycle_with_watcher() {
    let store = Store::in_memory();
    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, false)
        .unwrap();
    let watch = tickets.watch();

    // Registration snapshot: empty collection.
    let snapshot = watch.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(snapshot.is_empty());

    let id = tickets.add(&ita_ticket(), None).unwrap();

    // The very next snapshot contains exactly the new ticket.
    let snapshot = watch.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, id);
    assert_eq!(snapshot[0].data, ita_ticket());
    assert_eq!(snapshot[0].image_url, None);
    assert!(snapshot[0].owner.is_none());

    tickets.del(id, None).unwrap();

    let snapshot = watch.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(snapshot.is_empty());
}

#[test]
fn test_two_watchers_both_receive() {
    let store = Store::in_memory();
    let a = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();
    let b = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    let watch_a = a.watch();
    let watch_b = b.watch();
    watch_a.recv_timeout(TIMEOUT).unwrap().unwrap();
    watch_b.recv_timeout(TIMEOUT).unwrap().unwrap();

    // An add through one accessor reaches both watchers.
    a.add(&TripCity { name: "Rome".into() }, None).unwrap();

    for watch in [&watch_a, &watch_b] {
        let snapshot = watch.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].data.name, "Rome");
    }
}

#[test]
fn test_two_accessors_share_underlying_records() {
    let store = Store::in_memory();
    let a = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();
    let b = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    let id = a.add(&TripCity { name: "Florence".into() }, None).unwrap();

    // No accessor-local caching: b reads what a wrote.
    let record = b.get(id).unwrap().unwrap();
    assert_eq!(record.data.name, "Florence");

    b.del(id, None).unwrap();
    assert!(a.get(id).unwrap().is_none());
}

#[test]
fn test_scoped_roundtrip_and_update() {
    let store = Store::in_memory();
    store.sign_in("user-7");

    let stays = store
        .user_trip_collection::<Stay>("trip-42", sub::STAYS, false)
        .unwrap();
    assert_eq!(
        stays.path().as_str(),
        "users/user-7/trips/trip-42/stays"
    );

    let stay = Stay {
        name: "Hotel Roma".into(),
        price: 120.0,
        address: "Via Nazionale 1, Roma".into(),
        check_in: "2025-06-01".into(),
        check_out: "2025-06-05".into(),
        description: None,
    };
    let id = stays.add(&stay, None).unwrap();

    // add followed by get yields data plus the accessor-managed fields.
    let record = stays.get(id).unwrap().unwrap();
    assert_eq!(record.data, stay);
    assert_eq!(record.owner.as_ref().unwrap().as_str(), "user-7");
    assert!(record.updated_at.is_none());
    assert_eq!(record.image_url, None);

    stays.update(id, &json!({ "price": 99.0 })).unwrap();
    let record = stays.get(id).unwrap().unwrap();
    assert_eq!(record.data.price, 99.0);
    assert_eq!(record.data.name, "Hotel Roma");
    assert!(record.updated_at.is_some());
}

#[test]
fn test_scoped_accessor_survives_sign_out() {
    let store = Store::in_memory();
    store.sign_in("user-7");

    let cities = store
        .user_trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    // Identity was captured at construction; signing out does not affect
    // the already-bound accessor.
    store.sign_out();
    let id = cities.add(&TripCity { name: "Milan".into() }, None).unwrap();
    let record = cities.get(id).unwrap().unwrap();
    assert_eq!(record.owner.as_ref().unwrap().as_str(), "user-7");
}

#[test]
fn test_scoped_and_unscoped_paths_are_isolated() {
    let store = Store::in_memory();
    store.sign_in("user-7");

    let unscoped = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();
    let scoped = store
        .user_trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    unscoped.add(&TripCity { name: "Rome".into() }, None).unwrap();

    let watch = scoped.watch();
    let snapshot = watch.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(snapshot.is_empty());
}

#[test]
fn test_attachment_upload_and_cleanup() {
    let dir = TempDir::new().unwrap();
    let store = durable_store(&dir);

    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, true)
        .unwrap();

    let file = AttachmentFile::new("boarding-pass.jpg", "image/jpeg", b"jpeg bytes".to_vec());
    let id = tickets.add(&ita_ticket(), Some(&file)).unwrap();

    let record = tickets.get(id).unwrap().unwrap();
    let url = record.image_url.clone().unwrap();
    assert!(url.contains("tickets/trip-42/"));
    assert!(url.ends_with("-boarding-pass.jpg"));

    // The URL resolves to the live attachment until the record is deleted.
    let attachment = store.get_attachment(&url).unwrap().unwrap();
    assert_eq!(attachment.content, b"jpeg bytes");
    assert_eq!(attachment.content_type, "image/jpeg");

    tickets.del(id, Some(&url)).unwrap();
    assert!(tickets.get(id).unwrap().is_none());
    assert!(!store.attachment_exists(&url));
}

#[test]
fn test_attachment_enabled_add_without_file() {
    let dir = TempDir::new().unwrap();
    let store = durable_store(&dir);

    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, true)
        .unwrap();

    let id = tickets.add(&ita_ticket(), None).unwrap();
    let record = tickets.get(id).unwrap().unwrap();
    assert_eq!(record.image_url, None);
    assert_eq!(record.data.price, 450.0);

    assert_eq!(store.stats().unwrap().attachment_count, 0);
}

#[test]
fn test_durable_reopen_preserves_subcollections() {
    let dir = TempDir::new().unwrap();

    let (ticket_id, stay_id) = {
        let store = durable_store(&dir);
        store.sign_in("user-7");

        let tickets = store
            .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, false)
            .unwrap();
        let stays = store
            .user_trip_collection::<Stay>("trip-42", sub::STAYS, false)
            .unwrap();

        let ticket_id = tickets.add(&ita_ticket(), None).unwrap();
        let stay_id = stays
            .add(
                &Stay {
                    name: "B&B Trastevere".into(),
                    price: 80.0,
                    address: "Vicolo del Cedro 10, Roma".into(),
                    check_in: "2025-06-01".into(),
                    check_out: "2025-06-03".into(),
                    description: Some("Top floor".into()),
                },
                None,
            )
            .unwrap();
        (ticket_id, stay_id)
    };

    let store = durable_store(&dir);
    store.sign_in("user-7");

    let tickets = store
        .trip_collection::<FlightTicket>("trip-42", sub::TICKETS, false)
        .unwrap();
    assert_eq!(tickets.get(ticket_id).unwrap().unwrap().data, ita_ticket());

    let stays = store
        .user_trip_collection::<Stay>("trip-42", sub::STAYS, false)
        .unwrap();
    let stay = stays.get(stay_id).unwrap().unwrap();
    assert_eq!(stay.data.name, "B&B Trastevere");
    assert_eq!(stay.owner.as_ref().unwrap().as_str(), "user-7");
}

#[test]
fn test_trip_registry_watch() {
    let store = Store::in_memory();

    let watch = store.watch_trips();
    assert!(watch.recv_timeout(TIMEOUT).unwrap().unwrap().is_empty());

    let id = store
        .add_trip(&Trip {
            destination: "Tokyo".into(),
            country_code: "JP".into(),
            start_date: "2025-10-01".into(),
            end_date: None,
            travelers: 1,
        })
        .unwrap();

    let snapshot = watch.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].data.destination, "Tokyo");

    store.delete_trip(id).unwrap();
    assert!(watch.recv_timeout(TIMEOUT).unwrap().unwrap().is_empty());
}

#[test]
fn test_full_dashboard_workflow() {
    // A trip with several sub-resources managed through independent
    // accessors, the way the dashboard binds one card per sub-collection.
    let store = Store::in_memory();
    store.sign_in("user-7");

    let trip_id = "trip-rome";

    let tickets = store
        .trip_collection::<FlightTicket>(trip_id, sub::TICKETS, false)
        .unwrap();
    let meals = store
        .trip_collection::<resources::Meal>(trip_id, sub::MEALS, false)
        .unwrap();
    let luggage = store
        .trip_collection::<resources::Luggage>(trip_id, sub::LUGGAGE, false)
        .unwrap();
    let expenses = store
        .trip_collection::<resources::Expense>(trip_id, sub::EXPENSES, false)
        .unwrap();

    tickets.add(&ita_ticket(), None).unwrap();
    meals
        .add(
            &resources::Meal {
                name: "Trattoria da Enzo".into(),
                price: 35.0,
                address: "Via dei Vascellari 29".into(),
                date: "2025-06-02".into(),
            },
            None,
        )
        .unwrap();
    luggage
        .add(
            &resources::Luggage {
                name: "Cabin bag".into(),
                owner: "Io".into(),
                items: vec![resources::LuggageItem {
                    name: "Charger".into(),
                    checked: false,
                }],
            },
            None,
        )
        .unwrap();
    expenses
        .add(
            &resources::Expense {
                category: resources::expense_category::FOOD.into(),
                description: "Dinner".into(),
                amount: 35.0,
                date: "2025-06-02".into(),
            },
            None,
        )
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.record_count, 4);
    assert_eq!(stats.collection_count, 4);
}

#[test]
fn test_watch_unsubscribe_is_idempotent_and_raii() {
    let store = Store::in_memory();
    let cities = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    let watch = cities.watch();
    assert_eq!(store.watcher_count(), 1);

    watch.unsubscribe();
    watch.unsubscribe();
    assert_eq!(store.watcher_count(), 0);

    {
        let _watch = cities.watch();
        assert_eq!(store.watcher_count(), 1);
    }
    // Dropped watcher released its channel.
    assert_eq!(store.watcher_count(), 0);
}

#[test]
fn test_delete_is_idempotent() {
    let store = Store::in_memory();
    let cities = store
        .trip_collection::<TripCity>("trip-1", sub::CITIES, false)
        .unwrap();

    let id = cities.add(&TripCity { name: "Rome".into() }, None).unwrap();
    cities.del(id, None).unwrap();
    // Deleting again is a no-op, not an error.
    cities.del(id, None).unwrap();
    cities.del(RecordId(9999), None).unwrap();
}
