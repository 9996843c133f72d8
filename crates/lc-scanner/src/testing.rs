//! An in-memory scanner.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use lc_core::{CatalogEntry, EntryId, PathKey, PathKeyMap, path_key_map};
use parking_lot::RwLock;

use crate::error::ScanError;
use crate::Scanner;

#[derive(Debug, Clone)]
struct FakeItem {
    path: Utf8PathBuf,
    name: String,
    modified: DateTime<Utc>,
    unparseable: bool,
    transient_failures: u32,
}

/// A [`Scanner`] over items registered in memory instead of on disk.
///
/// Unknown paths are [`ScanError::NotFound`]. Items can be marked
/// unparseable, or made to fail with a retryable read error a number of
/// times before parsing succeeds.
///
/// # Examples
///
/// ```
/// use lc_scanner::{FakeScanner, Scanner};
/// use camino::Utf8Path;
///
/// let scanner = FakeScanner::new();
/// scanner.insert("/Apps/Foo.bundle");
///
/// let entry = scanner.parse(Utf8Path::new("/Apps/Foo.bundle")).unwrap();
/// assert_eq!(entry.name, "Foo");
/// assert!(scanner.parse(Utf8Path::new("/Apps/Bar.bundle")).unwrap_err().is_not_found());
/// ```
#[derive(Debug)]
pub struct FakeScanner {
    items: RwLock<PathKeyMap<FakeItem>>,
    default_icon: Utf8PathBuf,
    parse_calls: AtomicU64,
}

impl FakeScanner {
    /// Creates an empty scanner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(path_key_map()),
            default_icon: Utf8PathBuf::from("/icons/default.png"),
            parse_calls: AtomicU64::new(0),
        }
    }

    /// Registers an item named after its file stem.
    pub fn insert(&self, path: impl Into<Utf8PathBuf>) {
        let path = path.into();
        let name = path.file_stem().unwrap_or(path.as_str()).to_owned();
        self.insert_named(path, name);
    }

    /// Registers an item with an explicit name, replacing any previous one.
    pub fn insert_named(&self, path: impl Into<Utf8PathBuf>, name: impl Into<String>) {
        let path = path.into();
        let item = FakeItem {
            name: name.into(),
            modified: lc_core::fs::truncate_to_millis(Utc::now()),
            unparseable: false,
            transient_failures: 0,
            path: path.clone(),
        };
        self.items.write().insert(PathKey::new(&path), item);
    }

    /// Forgets an item.
    pub fn remove(&self, path: &Utf8Path) {
        self.items.write().remove(&PathKey::new(path));
    }

    /// Makes parsing of an existing item fail permanently.
    pub fn make_unparseable(&self, path: &Utf8Path) {
        if let Some(item) = self.items.write().get_mut(&PathKey::new(path)) {
            item.unparseable = true;
        }
    }

    /// Makes the next `times` parses of an existing item fail with a
    /// retryable read error.
    pub fn fail_transiently(&self, path: &Utf8Path, times: u32) {
        if let Some(item) = self.items.write().get_mut(&PathKey::new(path)) {
            item.transient_failures = times;
        }
    }

    /// Number of `parse` calls so far.
    #[must_use]
    pub fn parse_calls(&self) -> u64 {
        self.parse_calls.load(Ordering::Relaxed)
    }
}

impl Default for FakeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for FakeScanner {
    fn discover(&self) -> Result<Vec<Utf8PathBuf>, ScanError> {
        let mut paths: Vec<Utf8PathBuf> =
            self.items.read().values().map(|item| item.path.clone()).collect();
        paths.sort();
        Ok(paths)
    }

    fn parse(&self, path: &Utf8Path) -> Result<CatalogEntry, ScanError> {
        self.parse_calls.fetch_add(1, Ordering::Relaxed);

        let mut items = self.items.write();
        let Some(item) = items.get_mut(&PathKey::new(path)) else {
            return Err(ScanError::NotFound(path.to_owned()));
        };
        if item.transient_failures > 0 {
            item.transient_failures -= 1;
            return Err(ScanError::Read {
                path: path.to_owned(),
                source: io::Error::other("resource temporarily unavailable"),
            });
        }
        if item.unparseable {
            return Err(ScanError::unparseable(path, "rejected by fake scanner"));
        }
        Ok(CatalogEntry::new(
            EntryId::generate(),
            item.name.clone(),
            item.path.clone(),
            item.modified,
        ))
    }

    fn default_icon_path(&self) -> Utf8PathBuf {
        self.default_icon.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_failures_run_out() {
        let scanner = FakeScanner::new();
        let path = Utf8Path::new("/Apps/Foo.bundle");
        scanner.insert(path);
        scanner.fail_transiently(path, 2);

        assert!(scanner.parse(path).unwrap_err().is_retryable());
        assert!(scanner.parse(path).unwrap_err().is_retryable());
        assert!(scanner.parse(path).is_ok());
        assert_eq!(scanner.parse_calls(), 3);
    }

    #[test]
    fn test_unparseable_is_permanent() {
        let scanner = FakeScanner::new();
        let path = Utf8Path::new("/Apps/Broken.bundle");
        scanner.insert(path);
        scanner.make_unparseable(path);

        let err = scanner.parse(path).unwrap_err();
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_discover_is_sorted() {
        let scanner = FakeScanner::new();
        scanner.insert("/Apps/B.bundle");
        scanner.insert("/Apps/A.bundle");
        scanner.remove(Utf8Path::new("/Apps/B.bundle"));
        assert_eq!(scanner.discover().unwrap(), vec![Utf8PathBuf::from("/Apps/A.bundle")]);
    }
}
