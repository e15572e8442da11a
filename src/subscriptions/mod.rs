//! Live snapshot subscriptions.
//!
//! Watchers register against one collection path and receive the full
//! current record set on registration and after every committed mutation.

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{CollectionEvent, DropReason, SubscriptionId, WatchHandle};
