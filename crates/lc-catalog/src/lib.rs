//! Persistent catalog store for launchable items.
//!
//! [`CatalogStore`] is the storage interface the synchronization engine
//! writes through; [`SqliteCatalog`] implements it on SQLite in WAL mode.
//!
//! # Examples
//!
//! ```
//! use lc_catalog::{CatalogStore, SqliteCatalog};
//! use lc_core::{CatalogEntry, EntryId};
//! use camino::Utf8Path;
//! use chrono::Utc;
//!
//! let store = SqliteCatalog::open_in_memory()?;
//! let entry = CatalogEntry::new(EntryId::generate(), "Foo", "/Apps/Foo.app", Utc::now());
//! store.upsert_batch(&[entry])?;
//!
//! assert!(store.find_by_path(Utf8Path::new("/Apps/Foo.app"))?.is_some());
//! # Ok::<(), lc_catalog::CatalogError>(())
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod sqlite;
pub mod store;

pub use error::CatalogError;
pub use sqlite::SqliteCatalog;
pub use store::CatalogStore;
