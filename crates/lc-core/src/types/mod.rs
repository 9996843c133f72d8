//! Domain types for the catalog.
//!
//! - [`entry`] - Catalog entries, their identifiers and usage statistics
//! - [`path_key`] - Normalized path keys used for uniqueness
//!
//! Everything is re-exported at the crate root:
//!
//! ```
//! use lc_core::{CatalogEntry, EntryId, PathKey, UsageStats};
//! ```

mod entry;
mod path_key;

pub use entry::{CatalogEntry, EntryId, UsageStats};
pub use path_key::PathKey;
