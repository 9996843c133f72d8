//! A hand-driven change source.

use std::sync::atomic::{AtomicU64, Ordering};

use camino::Utf8PathBuf;
use lc_core::PathKey;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::WatchError;
use crate::events::ChangeEvent;
use crate::source::ChangeSource;

/// A [`ChangeSource`] whose events are pushed by the caller.
///
/// Behaves like [`FsWatcher`](crate::FsWatcher) towards consumers: the queue
/// is bounded, a full queue drops and counts, and `stop()` closes it.
///
/// # Examples
///
/// ```
/// use lc_watcher::{ChangeEvent, ChangeSource, ManualSource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = ManualSource::new(8);
/// let mut events = source.start().unwrap();
/// assert!(source.emit(ChangeEvent::added("/Apps/Foo.app")));
/// assert_eq!(events.recv().await, Some(ChangeEvent::added("/Apps/Foo.app")));
/// # }
/// ```
#[derive(Debug)]
pub struct ManualSource {
    capacity: usize,
    tx: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
    dirs: RwLock<Vec<Utf8PathBuf>>,
    dropped: AtomicU64,
}

impl ManualSource {
    /// Creates a stopped source with the given queue capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tx: Mutex::new(None),
            dirs: RwLock::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Pushes an event without waiting. Returns `false` if the source is
    /// stopped or the queue is full; the latter counts as a dropped event.
    pub fn emit(&self, event: ChangeEvent) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Pushes an event, waiting for queue space. Returns `false` if the
    /// source is stopped.
    pub async fn send(&self, event: ChangeEvent) -> bool {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ChangeSource for ManualSource {
    fn start(&self) -> Result<mpsc::Receiver<ChangeEvent>, WatchError> {
        let mut tx = self.tx.lock();
        if tx.is_some() {
            return Err(WatchError::AlreadyRunning);
        }
        let (sender, receiver) = mpsc::channel(self.capacity);
        *tx = Some(sender);
        Ok(receiver)
    }

    async fn stop(&self) {
        self.tx.lock().take();
    }

    fn add_watch_dir(&self, dir: Utf8PathBuf) -> Result<(), WatchError> {
        let mut dirs = self.dirs.write();
        let key = PathKey::new(&dir);
        if !dirs.iter().any(|d| PathKey::new(d) == key) {
            dirs.push(dir);
        }
        Ok(())
    }

    fn watch_dirs(&self) -> Vec<Utf8PathBuf> {
        self.dirs.read().clone()
    }

    fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
