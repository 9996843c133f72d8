//! Error types for the lc-scanner crate.
//!
//! This module provides the [`ScanError`] type for errors that can occur
//! while discovering or parsing launchable items.

use camino::Utf8PathBuf;

/// Errors that can occur during scanning operations.
///
/// # Error Recovery Strategy
///
/// - **Not found** ([`ScanError::NotFound`]): The item is gone; callers treat
///   this as an implicit removal
/// - **Unparseable** ([`ScanError::Unparseable`]): The item exists but is not
///   a usable launchable item; retrying will not help
/// - **Read errors** ([`ScanError::Read`]): Often transient (an installer still
///   writing, a locked file); worth retrying
/// - **Walk errors** ([`ScanError::Walk`]): A discovery root could not be
///   traversed
/// - **Non-UTF-8 path** ([`ScanError::NonUtf8Path`]): Skipped
///
/// # Examples
///
/// ```
/// use lc_scanner::ScanError;
///
/// let err = ScanError::unparseable("/Apps/Broken.desktop", "missing Name key");
/// assert!(!err.is_retryable());
/// assert!(err.to_string().contains("missing Name key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The item does not exist (anymore).
    #[error("item does not exist: {0}")]
    NotFound(Utf8PathBuf),

    /// The item exists but could not be turned into a catalog entry.
    #[error("cannot parse {path}: {reason}")]
    Unparseable {
        /// The item that failed to parse.
        path: Utf8PathBuf,
        /// Why it failed.
        reason: String,
    },

    /// Failed to read the item.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The item that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to walk a discovery root.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),
}

impl ScanError {
    /// Creates a new [`ScanError::Unparseable`] error.
    #[inline]
    pub fn unparseable(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unparseable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O error on `path` to [`ScanError::NotFound`] or
    /// [`ScanError::Read`].
    pub fn from_io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.into())
        } else {
            Self::Read {
                path: path.into(),
                source,
            }
        }
    }

    /// Returns `true` if the item no longer exists.
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if trying again later might succeed.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Walk(_))
    }

    /// Returns the item path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::NotFound(path) | Self::Unparseable { path, .. } | Self::Read { path, .. } => {
                Some(path)
            }
            Self::Walk(_) | Self::NonUtf8Path(_) => None,
        }
    }
}
