//! The change-source capability.

use std::future::Future;

use camino::Utf8PathBuf;
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::events::ChangeEvent;

/// Something that produces [`ChangeEvent`]s for a set of directories.
///
/// [`FsWatcher`](crate::FsWatcher) is the native implementation;
/// [`ManualSource`](crate::ManualSource) lets tests inject events.
pub trait ChangeSource: Send + Sync + 'static {
    /// Starts producing events and returns the receiving end of the bounded
    /// event queue.
    ///
    /// Fails with [`WatchError::AlreadyRunning`] if already started.
    fn start(&self) -> Result<mpsc::Receiver<ChangeEvent>, WatchError>;

    /// Stops producing events, releases native resources and closes the
    /// queue. Resolves once every internal task has finished. Idempotent.
    fn stop(&self) -> impl Future<Output = ()> + Send;

    /// Adds a directory; watched immediately if running, otherwise from the
    /// next `start()`.
    fn add_watch_dir(&self, dir: Utf8PathBuf) -> Result<(), WatchError>;

    /// The configured directories.
    fn watch_dirs(&self) -> Vec<Utf8PathBuf>;

    /// Returns `true` between a successful `start()` and `stop()`.
    fn is_running(&self) -> bool;

    /// Events dropped because the queue was full, since construction.
    fn dropped_events(&self) -> u64;
}
