//! The catalog store interface.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use lc_core::{CatalogEntry, EntryId, UsageStats};

use crate::error::CatalogError;

/// Persistent set of catalog entries, unique by normalized path.
///
/// Every entry carries a *verified* timestamp: the last time it was written
/// or confirmed against the filesystem. Staleness is measured against it.
///
/// Batch operations are all-or-nothing: a failure anywhere in the batch
/// leaves the store exactly as it was.
///
/// Production: SQLite with WAL mode ([`SqliteCatalog`](crate::SqliteCatalog))
/// Testing: the same store opened in memory
pub trait CatalogStore: Send + Sync + 'static {
    /// Returns every entry.
    fn list(&self) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Returns the entry whose normalized path equals that of `path`.
    fn find_by_path(&self, path: &Utf8Path) -> Result<Option<CatalogEntry>, CatalogError>;

    /// Returns entries not verified within `threshold`.
    fn find_stale(&self, threshold: Duration) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Inserts new entries and updates existing ones, all in one
    /// transaction. An entry matches an existing row by normalized path or
    /// by id; a path match keeps the stored id. Usage statistics of existing
    /// rows are never overwritten. Every written row is marked verified.
    ///
    /// Returns the number of rows written.
    fn upsert_batch(&self, entries: &[CatalogEntry]) -> Result<usize, CatalogError>;

    /// Overwrites the metadata of rows that still exist (matched by id), in
    /// one transaction. Entries whose row is gone are skipped, never
    /// re-inserted. Usage statistics are untouched.
    ///
    /// Returns the number of rows updated.
    fn update_batch(&self, entries: &[CatalogEntry]) -> Result<usize, CatalogError>;

    /// Deletes entries by id in one transaction. Unknown ids are ignored.
    ///
    /// Returns the number of rows deleted.
    fn delete_batch(&self, ids: &[EntryId]) -> Result<usize, CatalogError>;

    /// Marks entries as verified without changing them, in one transaction.
    fn touch_batch(&self, ids: &[EntryId]) -> Result<usize, CatalogError>;

    /// Records one launch of an entry and returns its updated usage.
    fn record_launch(&self, id: &EntryId, at: DateTime<Utc>) -> Result<UsageStats, CatalogError>;

    /// Returns the number of entries.
    fn len(&self) -> Result<usize, CatalogError>;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> Result<bool, CatalogError> {
        self.len().map(|n| n == 0)
    }
}

impl<T: CatalogStore> CatalogStore for Arc<T> {
    fn list(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.as_ref().list()
    }

    fn find_by_path(&self, path: &Utf8Path) -> Result<Option<CatalogEntry>, CatalogError> {
        self.as_ref().find_by_path(path)
    }

    fn find_stale(&self, threshold: Duration) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.as_ref().find_stale(threshold)
    }

    fn upsert_batch(&self, entries: &[CatalogEntry]) -> Result<usize, CatalogError> {
        self.as_ref().upsert_batch(entries)
    }

    fn delete_batch(&self, ids: &[EntryId]) -> Result<usize, CatalogError> {
        self.as_ref().delete_batch(ids)
    }

    fn update_batch(&self, entries: &[CatalogEntry]) -> Result<usize, CatalogError> {
        self.as_ref().update_batch(entries)
    }

    fn touch_batch(&self, ids: &[EntryId]) -> Result<usize, CatalogError> {
        self.as_ref().touch_batch(ids)
    }

    fn record_launch(&self, id: &EntryId, at: DateTime<Utc>) -> Result<UsageStats, CatalogError> {
        self.as_ref().record_launch(id, at)
    }

    fn len(&self) -> Result<usize, CatalogError> {
        self.as_ref().len()
    }
}
