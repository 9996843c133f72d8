//! Catalog entry types.
//!
//! A [`CatalogEntry`] is one launchable item known to the catalog. Entries are
//! created by a scanner's `parse`, persisted by the catalog store, refreshed in
//! place when their item changes on disk, and removed once the item is gone.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::path_key::PathKey;

/// Stable identifier of a catalog entry.
///
/// Assigned once when an item is first parsed (a random UUID v4) and kept for
/// the lifetime of the entry, including across in-place updates. Identifiers
/// of removed entries are never handed out again.
///
/// # Examples
///
/// ```
/// use lc_core::EntryId;
///
/// let a = EntryId::generate();
/// let b = EntryId::generate();
/// assert_ne!(a, b);
/// assert_eq!(a.as_str().len(), 36);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntryId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntryId {
    #[inline]
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Launch statistics attached to an entry.
///
/// Usage belongs to the entry identity, not to its on-disk metadata, so it
/// survives every in-place update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// When the item was last launched through the catalog.
    pub last_used_at: Option<DateTime<Utc>>,
    /// How many times the item was launched through the catalog.
    pub use_count: u64,
}

impl UsageStats {
    /// Records one launch at `at`.
    pub fn record(&mut self, at: DateTime<Utc>) {
        self.use_count = self.use_count.saturating_add(1);
        self.last_used_at = Some(at);
    }
}

/// One launchable item in the catalog.
///
/// # Examples
///
/// ```
/// use lc_core::{CatalogEntry, EntryId};
/// use camino::Utf8PathBuf;
/// use chrono::Utc;
///
/// let entry = CatalogEntry::new(
///     EntryId::generate(),
///     "Foo",
///     Utf8PathBuf::from("/Applications/Foo.app"),
///     Utc::now(),
/// )
/// .with_description("Does foo things");
///
/// assert_eq!(entry.name, "Foo");
/// assert_eq!(entry.usage.use_count, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable identifier.
    pub id: EntryId,

    /// Display name.
    pub name: String,

    /// Optional longer description.
    pub description: Option<String>,

    /// Absolute location of the item on disk.
    pub path: Utf8PathBuf,

    /// Icon location, if the item declares one.
    pub icon_path: Option<Utf8PathBuf>,

    /// Last known modification time of the item on disk.
    ///
    /// Compared against a fresh `stat` to decide whether the item needs to be
    /// parsed again.
    pub dir_updated_at: DateTime<Utc>,

    /// Launch statistics.
    #[serde(default)]
    pub usage: UsageStats,
}

impl CatalogEntry {
    /// Creates an entry with no description, no icon and empty usage.
    #[must_use]
    pub fn new(
        id: EntryId,
        name: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
        dir_updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            path: path.into(),
            icon_path: None,
            dir_updated_at,
            usage: UsageStats::default(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the icon path.
    #[must_use]
    pub fn with_icon(mut self, icon_path: impl Into<Utf8PathBuf>) -> Self {
        self.icon_path = Some(icon_path.into());
        self
    }

    /// Returns the normalized key of this entry's path.
    #[inline]
    #[must_use]
    pub fn path_key(&self) -> PathKey {
        PathKey::new(&self.path)
    }

    /// Returns the entry's path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Takes over the identity of `existing`: its id and usage statistics.
    ///
    /// Used when a freshly parsed entry replaces a stored one for the same
    /// path. Everything else (name, description, icon, modification time)
    /// comes from the fresh parse.
    pub fn inherit_identity(&mut self, existing: &CatalogEntry) {
        self.id = existing.id.clone();
        self.usage = existing.usage;
    }

    /// Returns `true` if the on-disk metadata of both entries is the same.
    ///
    /// Identity and usage are ignored.
    #[must_use]
    pub fn same_metadata(&self, other: &CatalogEntry) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.icon_path == other.icon_path
            && self.dir_updated_at == other.dir_updated_at
            && self.path_key() == other.path_key()
    }
}
