//! Path-addressed attachment storage.

mod storage;

pub use storage::BlobStorage;
