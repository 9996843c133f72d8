//! Reconciliation of change events into the catalog.
//!
//! Every operation is keyed by normalized path, so replaying an event is
//! harmless: an entry that already exists keeps its id and usage statistics
//! and only its on-disk metadata is refreshed.

use camino::Utf8Path;
use lc_catalog::CatalogStore;
use lc_core::CatalogEntry;

use crate::error::SyncError;
use crate::sink::ChangeSink;

/// Applies classified changes to the catalog.
///
/// Implementations perform blocking store I/O.
pub trait EventHandler: Send + Sync + 'static {
    /// A new item was parsed.
    fn on_added(&self, entry: CatalogEntry) -> Result<(), SyncError>;

    /// The item at `path` is gone. Absent entries are a no-op.
    fn on_removed(&self, path: &Utf8Path) -> Result<(), SyncError>;

    /// An existing item was parsed again.
    fn on_modified(&self, entry: CatalogEntry) -> Result<(), SyncError>;
}

impl<T: EventHandler> EventHandler for std::sync::Arc<T> {
    fn on_added(&self, entry: CatalogEntry) -> Result<(), SyncError> {
        self.as_ref().on_added(entry)
    }

    fn on_removed(&self, path: &Utf8Path) -> Result<(), SyncError> {
        self.as_ref().on_removed(path)
    }

    fn on_modified(&self, entry: CatalogEntry) -> Result<(), SyncError> {
        self.as_ref().on_modified(entry)
    }
}

/// [`EventHandler`] writing through a [`CatalogStore`].
#[derive(Debug)]
pub struct CatalogReconciler<C, K> {
    store: C,
    sink: K,
}

impl<C: CatalogStore, K: ChangeSink> CatalogReconciler<C, K> {
    /// Creates a reconciler notifying `sink` after every committed change.
    pub const fn new(store: C, sink: K) -> Self {
        Self { store, sink }
    }

    /// The underlying store.
    pub const fn store(&self) -> &C {
        &self.store
    }

    /// Inserts `entry`, or updates the entry already stored for its path.
    ///
    /// Returns `true` if anything was written.
    fn upsert_by_path(&self, mut entry: CatalogEntry) -> Result<bool, SyncError> {
        match self.store.find_by_path(&entry.path)? {
            Some(existing) => {
                entry.inherit_identity(&existing);
                if entry.same_metadata(&existing) {
                    self.store.touch_batch(&[existing.id])?;
                    tracing::trace!(path = %entry.path, "entry unchanged");
                    return Ok(false);
                }
                self.store.upsert_batch(&[entry])?;
            }
            None => {
                // A row for this path committed since the lookup keeps its id.
                self.store.upsert_batch(&[entry])?;
            }
        }
        Ok(true)
    }
}

impl<C: CatalogStore, K: ChangeSink> EventHandler for CatalogReconciler<C, K> {
    fn on_added(&self, entry: CatalogEntry) -> Result<(), SyncError> {
        let (name, path) = (entry.name.clone(), entry.path.clone());
        if self.upsert_by_path(entry)? {
            tracing::info!(name = %name, path = %path, "application added");
            self.sink.catalog_changed();
        }
        Ok(())
    }

    fn on_removed(&self, path: &Utf8Path) -> Result<(), SyncError> {
        let Some(existing) = self.store.find_by_path(path)? else {
            tracing::debug!(path = %path, "removed item was not cataloged");
            return Ok(());
        };
        self.store.delete_batch(&[existing.id])?;
        tracing::info!(name = %existing.name, path = %path, "application removed");
        self.sink.catalog_changed();
        Ok(())
    }

    fn on_modified(&self, entry: CatalogEntry) -> Result<(), SyncError> {
        let (name, path) = (entry.name.clone(), entry.path.clone());
        if self.upsert_by_path(entry)? {
            tracing::info!(name = %name, path = %path, "application updated");
            self.sink.catalog_changed();
        }
        Ok(())
    }
}
