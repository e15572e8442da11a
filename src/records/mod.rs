//! Document record storage.

mod collections;

pub use collections::CollectionSet;
