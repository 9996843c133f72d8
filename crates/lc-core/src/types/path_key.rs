//! Normalized catalog path keys.

use std::fmt;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// The normalized form of a catalog path, used for uniqueness checks and
/// deduplication.
///
/// Two paths that name the same launchable item map to the same key:
///
/// - trailing separators are stripped (`/Apps/Foo.app/` == `/Apps/Foo.app`)
/// - on macOS and Windows, whose default filesystems are case-insensitive,
///   the key is lowercased
///
/// The original path is never replaced by its key; entries keep the path as
/// reported by the filesystem.
///
/// # Examples
///
/// ```
/// use lc_core::PathKey;
/// use camino::Utf8Path;
///
/// let a = PathKey::new(Utf8Path::new("/Applications/Foo.app/"));
/// let b = PathKey::new(Utf8Path::new("/Applications/Foo.app"));
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
    /// Normalizes `path` into a key.
    #[must_use]
    pub fn new(path: &Utf8Path) -> Self {
        let raw = path.as_str();
        let trimmed = raw.trim_end_matches(is_separator);
        let trimmed = if trimmed.is_empty() && !raw.is_empty() {
            &raw[..1]
        } else {
            trimmed
        };
        Self(fold_case(trimmed))
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Utf8Path> for PathKey {
    #[inline]
    fn from(path: &Utf8Path) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(windows)]
fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

#[cfg(not(windows))]
fn is_separator(c: char) -> bool {
    c == '/'
}

#[cfg(any(target_os = "macos", windows))]
fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

#[cfg(not(any(target_os = "macos", windows)))]
fn fold_case(s: &str) -> String {
    s.to_owned()
}
