//! Error types for the lc-sync crate.
//!
//! [`SyncError`] is what handling one change event, or one refresh pass, can
//! fail with. [`Retryable`] lets the retry policy ask an error whether
//! another attempt could succeed.

use lc_catalog::CatalogError;
use lc_core::ConfigError;
use lc_scanner::ScanError;
use lc_watcher::WatchError;

/// Errors reported by the synchronization engine.
///
/// # Error Recovery Strategy
///
/// - **Already running** ([`SyncError::AlreadyRunning`]): Caller bug; the
///   running engine is unaffected
/// - **Configuration** ([`SyncError::Config`]): Fatal, rejected before start
/// - **Watch** ([`SyncError::Watch`]): Fatal to watching; the refresher
///   still keeps the catalog in shape
/// - **Scan** ([`SyncError::Scan`]): Retried when the read failed, never when
///   the item is unparseable
/// - **Catalog** ([`SyncError::Catalog`]): Retried when the database was busy
///   or the disk failed
/// - **Task** ([`SyncError::Task`]): A blocking worker panicked; not retried
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// `start()` was called on a running component.
    #[error("already running")]
    AlreadyRunning,

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The change source failed.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Discovering or parsing an item failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The catalog store failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A blocking worker did not complete.
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    /// Returns `true` if this error prevents the engine from starting.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AlreadyRunning | Self::Config(_) => true,
            Self::Watch(err) => err.is_fatal(),
            Self::Scan(_) | Self::Catalog(_) | Self::Task(_) => false,
        }
    }
}

/// Errors that know whether retrying the failed operation may help.
pub trait Retryable {
    /// Returns `true` if another attempt could succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Scan(err) => err.is_retryable(),
            Self::Catalog(err) => err.is_retryable(),
            Self::AlreadyRunning | Self::Config(_) | Self::Watch(_) | Self::Task(_) => false,
        }
    }
}

impl Retryable for ScanError {
    fn is_retryable(&self) -> bool {
        ScanError::is_retryable(self)
    }
}

impl Retryable for CatalogError {
    fn is_retryable(&self) -> bool {
        CatalogError::is_retryable(self)
    }
}
