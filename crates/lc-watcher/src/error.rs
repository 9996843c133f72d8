//! Error types for the lc-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while setting up or changing filesystem watches.

use camino::Utf8PathBuf;
use lc_core::ConfigError;

/// Errors that can occur during watch setup.
///
/// Once a watcher is running, nothing fails loudly: unreadable paths are
/// skipped and a full queue drops events, both with logs.
///
/// # Error Recovery Strategy
///
/// - **Already running** ([`WatchError::AlreadyRunning`]): Caller bug; the
///   running watcher is unaffected
/// - **Path not found** ([`WatchError::PathNotFound`]): Recoverable - the
///   directory is skipped and the others are still watched
/// - **No watchable directories** ([`WatchError::NoWatchableDirectories`]):
///   Fatal - there is nothing to watch
/// - **Notify errors** ([`WatchError::Notify`]): Fatal when creating the
///   native watcher, recoverable for a single directory
/// - **Invalid configuration** ([`WatchError::Config`]): Fatal, raised at
///   construction
///
/// # Examples
///
/// ```
/// use lc_watcher::WatchError;
///
/// let err = WatchError::path_not_found("/Applications/Missing");
/// assert!(err.is_recoverable());
/// assert!(WatchError::AlreadyRunning.is_fatal());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// `start()` was called on a running watcher.
    #[error("watcher is already running")]
    AlreadyRunning,

    /// None of the configured directories could be watched.
    #[error("none of the {attempted} configured directories could be watched")]
    NoWatchableDirectories {
        /// How many directories were tried.
        attempted: usize,
    },

    /// The native watcher failed.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A directory to watch does not exist.
    #[error("watch directory does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The watcher configuration is invalid.
    #[error("invalid watcher configuration: {0}")]
    Config(#[from] ConfigError),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Returns `true` if watching can continue without the failed part.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::PathNotFound(_))
    }

    /// Returns `true` if this error prevents watching.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the directory associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) => Some(path),
            Self::AlreadyRunning
            | Self::NoWatchableDirectories { .. }
            | Self::Notify(_)
            | Self::Config(_) => None,
        }
    }
}
