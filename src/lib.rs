//! # Trip Store
//!
//! A trip-scoped document store with live snapshot subscriptions and file
//! attachments, for personal travel-planning data (tickets, stays, meals,
//! itineraries, ...).
//!
//! ## Core Concepts
//!
//! - **Documents**: Schemaless records in nested collections keyed by
//!   `trips/{tripId}/{sub}` paths, optionally isolated per owner
//! - **Watchers**: Push-based subscriptions delivering the full current
//!   record set on every change
//! - **Attachments**: File blobs uploaded alongside record creation and
//!   cleaned up (best-effort) on delete
//! - **Collections**: One generic accessor bound per (trip, sub-resource)
//!
//! ## Example
//!
//! ```ignore
//! use tripstore::{resources::FlightTicket, Store};
//!
//! let store = Store::in_memory();
//! let tickets = store.trip_collection::<FlightTicket>("trip-42", "tickets", false)?;
//!
//! let watch = tickets.watch();
//! tickets.add(&FlightTicket {
//!     airline: "ITA".into(),
//!     from: "FCO".into(),
//!     to: "JFK".into(),
//!     date: "2025-06-01".into(),
//!     time: "10:00".into(),
//!     price: 450.0,
//! }, None)?;
//!
//! let snapshot = watch.recv()?; // registration snapshot
//! let snapshot = watch.recv()?; // contains the new ticket
//! ```

pub mod blobs;
pub mod collections;
pub mod error;
pub mod identity;
pub mod records;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use blobs::BlobStorage;
pub use collections::resources;
pub use collections::{Collection, Watch};
pub use error::{Result, StoreError};
pub use identity::IdentityProvider;
pub use records::CollectionSet;
pub use store::{Store, StoreConfig};
pub use subscriptions::{
    CollectionEvent, DropReason, SubscriptionId, SubscriptionManager, WatchHandle,
};
pub use types::*;
