//! Bound sub-collection accessors and the typed resource catalog.

mod accessor;
pub mod resources;

pub use accessor::{Collection, Watch};
