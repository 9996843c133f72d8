//! Filesystem helpers shared by the scanner, the watcher and the refresher.

use std::io;

use camino::Utf8Path;
use chrono::{DateTime, Utc};

/// Returns the modification time of `path`, truncated to whole milliseconds.
///
/// Millisecond precision is what the catalog store persists, so a value
/// returned here compares equal to the same value read back from the store.
///
/// # Errors
///
/// Returns the `stat` error, including [`io::ErrorKind::NotFound`] when the
/// path does not exist.
pub fn modified_at(path: &Utf8Path) -> io::Result<DateTime<Utc>> {
    let modified: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();
    Ok(truncate_to_millis(modified))
}

/// Drops sub-millisecond precision from `at`.
#[must_use]
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

/// Returns `true` if `path` exists. Errors other than "not found" count as
/// existing, since the item may still be there.
#[must_use]
pub fn exists(path: &Utf8Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(err) => err.kind() != io::ErrorKind::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_modified_at_existing_file() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let file = dir.path().join("Foo.desktop");
        std::fs::write(&file, "[Desktop Entry]").expect("write");
        let path = Utf8Path::from_path(&file).expect("utf-8 path");

        let at = modified_at(path).expect("stat");
        assert_eq!(at.timestamp_subsec_nanos() % 1_000_000, 0);
        assert!(exists(path));
    }

    #[test]
    fn test_modified_at_missing_file() {
        let err = modified_at(Utf8Path::new("/definitely/not/here.app")).expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!exists(Utf8Path::new("/definitely/not/here.app")));
    }
}
