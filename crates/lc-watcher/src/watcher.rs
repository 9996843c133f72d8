//! Native filesystem watcher.
//!
//! [`FsWatcher`] bridges the synchronous `notify` callback to the async
//! runtime and turns raw notifications into debounced [`ChangeEvent`]s.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                  notify thread (RecommendedWatcher)              │
//! │   callback: map kind ─► RawOp, drop non-UTF-8 ─► unbounded send  │
//! └──────────────────────────────────┬───────────────────────────────┘
//!                                    │ never blocks
//!                                    ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        pump task (tokio)                         │
//! │   resolve item ─► per-path debounce ─► classify ─► try_send      │
//! │   (registers new subdirectories on EveryDirectory platforms)     │
//! └──────────────────────────────────┬───────────────────────────────┘
//!                                    │ bounded; full ─► drop + count
//!                                    ▼
//!                        mpsc::Receiver<ChangeEvent>
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use lc_core::{LaunchableShape, PathKey, WatchStrategy, WatcherConfig};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::debounce::Debouncer;
use crate::error::WatchError;
use crate::events::{ChangeEvent, RawOp, classify};
use crate::source::ChangeSource;

/// A raw notification forwarded from the notify thread.
#[derive(Debug)]
struct RawChange {
    path: Utf8PathBuf,
    op: RawOp,
}

/// State that only exists while the watcher runs.
struct Running {
    native: Arc<Mutex<RecommendedWatcher>>,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

/// Native filesystem watcher for one launchable shape.
///
/// # Examples
///
/// ```no_run
/// use lc_core::{PlatformShape, WatcherConfig};
/// use lc_watcher::{ChangeSource, FsWatcher};
///
/// # async fn example() -> Result<(), lc_watcher::WatchError> {
/// let config = WatcherConfig::default();
/// let watcher = FsWatcher::from_config(PlatformShape::default(), &config)?;
///
/// let mut events = watcher.start()?;
/// while let Some(event) = events.recv().await {
///     println!("{event}");
/// }
/// watcher.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct FsWatcher<S: LaunchableShape> {
    shape: Arc<S>,
    debounce: Duration,
    capacity: usize,
    dirs: RwLock<Vec<Utf8PathBuf>>,
    state: Mutex<Option<Running>>,
    dropped: Arc<AtomicU64>,
}

impl<S: LaunchableShape> std::fmt::Debug for FsWatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher")
            .field("shape", &self.shape.name())
            .field("dirs", &*self.dirs.read())
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<S: LaunchableShape> FsWatcher<S> {
    /// Creates a stopped watcher for `dirs`.
    ///
    /// `config` is validated first; only `debounce_ms` and
    /// `event_buffer_size` are kept.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if `config` is invalid.
    pub fn new(shape: S, dirs: Vec<Utf8PathBuf>, config: &WatcherConfig) -> Result<Self, WatchError> {
        config.validate()?;
        Ok(Self {
            shape: Arc::new(shape),
            debounce: config.debounce(),
            capacity: config.event_buffer_size,
            dirs: RwLock::new(dirs),
            state: Mutex::new(None),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Creates a stopped watcher for the directories `config` resolves for
    /// `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if `config` is invalid.
    pub fn from_config(shape: S, config: &WatcherConfig) -> Result<Self, WatchError> {
        let dirs = config.watch_dirs(&shape);
        Self::new(shape, dirs, config)
    }

    /// The shape this watcher reports.
    #[must_use]
    pub fn shape(&self) -> &S {
        &self.shape
    }
}

impl<S: LaunchableShape> ChangeSource for FsWatcher<S> {
    /// Registers every directory and starts the pump.
    ///
    /// Directories that cannot be watched are logged and skipped; if none of
    /// them can be, the watcher stays stopped. Must be called from within a
    /// Tokio runtime.
    fn start(&self) -> Result<mpsc::Receiver<ChangeEvent>, WatchError> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let native = notify::recommended_watcher(move |res| forward(&raw_tx, res))?;
        let native = Arc::new(Mutex::new(native));

        let dirs = self.dirs.read().clone();
        let strategy = self.shape.watch_strategy();
        let mut watched = 0_usize;
        {
            let mut guard = native.lock();
            for dir in &dirs {
                match register(&mut guard, dir, strategy) {
                    Ok(watches) => {
                        watched += 1;
                        tracing::info!(path = %dir, watches, "watching directory");
                    }
                    Err(err) => {
                        tracing::warn!(path = %dir, error = %err, "cannot watch directory, skipping");
                    }
                }
            }
        }
        if dirs.is_empty() {
            tracing::warn!("no watch directories configured");
        } else if watched == 0 {
            return Err(WatchError::NoWatchableDirectories {
                attempted: dirs.len(),
            });
        }

        let (out_tx, out_rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();
        let pump = Pump {
            shape: Arc::clone(&self.shape),
            strategy,
            debouncer: Debouncer::new(self.debounce),
            raw_rx,
            out_tx,
            native: Arc::downgrade(&native),
            cancel: cancel.clone(),
            dropped: Arc::clone(&self.dropped),
        };
        let pump = tokio::spawn(pump.run());

        tracing::info!(
            shape = self.shape.name(),
            dirs = watched,
            debounce_ms = u64::try_from(self.debounce.as_millis()).unwrap_or(u64::MAX),
            capacity = self.capacity,
            "filesystem watcher started"
        );
        *state = Some(Running {
            native,
            cancel,
            pump,
        });
        Ok(out_rx)
    }

    async fn stop(&self) {
        let running = self.state.lock().take();
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        // The pump only holds a weak reference, so this releases every
        // native watch handle.
        drop(running.native);
        if let Err(err) = running.pump.await {
            tracing::warn!(error = %err, "event pump terminated abnormally");
        }
        tracing::info!("filesystem watcher stopped");
    }

    fn add_watch_dir(&self, dir: Utf8PathBuf) -> Result<(), WatchError> {
        {
            let mut dirs = self.dirs.write();
            let key = PathKey::new(&dir);
            if dirs.iter().any(|d| PathKey::new(d) == key) {
                return Ok(());
            }
            dirs.push(dir.clone());
        }

        let state = self.state.lock();
        if let Some(running) = state.as_ref() {
            let watches = register(&mut running.native.lock(), &dir, self.shape.watch_strategy())?;
            tracing::info!(path = %dir, watches, "watching directory");
        }
        Ok(())
    }

    fn watch_dirs(&self) -> Vec<Utf8PathBuf> {
        self.dirs.read().clone()
    }

    fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }

    fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The notify callback. Runs on the notify thread and must never block.
fn forward(raw_tx: &mpsc::UnboundedSender<RawChange>, res: notify::Result<notify::Event>) {
    let event = match res {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "native watcher error");
            return;
        }
    };
    let Some(op) = RawOp::from_notify(&event.kind) else {
        return;
    };
    for path in event.paths {
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => {
                if raw_tx.send(RawChange { path, op }).is_err() {
                    return;
                }
            }
            Err(path) => {
                tracing::warn!(path = %path.display(), "skipping non-UTF-8 path in file event");
            }
        }
    }
}

/// Registers watches for one configured directory and returns how many
/// native watches were added.
fn register(
    native: &mut RecommendedWatcher,
    dir: &Utf8Path,
    strategy: WatchStrategy,
) -> Result<usize, WatchError> {
    if !dir.is_dir() {
        return Err(WatchError::path_not_found(dir));
    }
    match strategy {
        WatchStrategy::Recursive => {
            native.watch(dir.as_std_path(), RecursiveMode::Recursive)?;
            Ok(1)
        }
        WatchStrategy::TopLevel => {
            native.watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
            Ok(1)
        }
        WatchStrategy::EveryDirectory => {
            native.watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
            let mut watches = 1;
            for sub in collect_subdirs(dir) {
                match native.watch(sub.as_std_path(), RecursiveMode::NonRecursive) {
                    Ok(()) => watches += 1,
                    Err(err) => {
                        tracing::debug!(path = %sub, error = %err, "cannot watch subdirectory");
                    }
                }
            }
            Ok(watches)
        }
    }
}

/// Every directory strictly below `root`, skipping hidden ones.
fn collect_subdirs(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.depth() > 0 && entry.file_type().is_some_and(|ft| ft.is_dir()))
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .collect()
}

/// Pushes an event without waiting. A full queue drops the event and counts
/// it.
fn enqueue(out_tx: &mpsc::Sender<ChangeEvent>, event: ChangeEvent, dropped: &AtomicU64) -> bool {
    match out_tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            dropped.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                kind = %event.kind,
                path = %event.path,
                "event queue full, dropping event"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("event queue closed");
            false
        }
    }
}

struct Pump<S> {
    shape: Arc<S>,
    strategy: WatchStrategy,
    debouncer: Debouncer,
    raw_rx: mpsc::UnboundedReceiver<RawChange>,
    out_tx: mpsc::Sender<ChangeEvent>,
    native: Weak<Mutex<RecommendedWatcher>>,
    cancel: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl<S: LaunchableShape> Pump<S> {
    async fn run(mut self) {
        loop {
            let deadline = self.debouncer.next_deadline();
            tokio::select! {
                () = self.cancel.cancelled() => break,
                raw = self.raw_rx.recv() => match raw {
                    Some(raw) => self.on_raw(raw),
                    None => break,
                },
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => self.flush(),
            }
        }
        tracing::debug!(pending = self.debouncer.len(), "event pump stopped");
    }

    fn on_raw(&mut self, raw: RawChange) {
        if self.strategy == WatchStrategy::EveryDirectory
            && raw.op == RawOp::Create
            && raw.path.is_dir()
        {
            self.watch_new_dir(&raw.path);
        }

        let Some(item) = self.shape.resolve(&raw.path) else {
            tracing::trace!(path = %raw.path, "ignoring unrelated path");
            return;
        };
        // Anything happening inside an item changes the item itself.
        let op = if item == raw.path { raw.op } else { RawOp::Write };
        self.debouncer.push(item, op, Instant::now());
    }

    fn flush(&mut self) {
        for (path, op) in self.debouncer.drain_due(Instant::now()) {
            let event = ChangeEvent::new(classify(op, &path), path);
            tracing::debug!(kind = %event.kind, path = %event.path, "change detected");
            enqueue(&self.out_tx, event, &self.dropped);
        }
    }

    fn watch_new_dir(&self, dir: &Utf8Path) {
        let Some(native) = self.native.upgrade() else {
            return;
        };
        match register(&mut native.lock(), dir, self.strategy) {
            Ok(watches) => tracing::debug!(path = %dir, watches, "watching new subdirectory"),
            Err(err) => tracing::debug!(path = %dir, error = %err, "cannot watch new subdirectory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use lc_core::{BundleShape, DesktopEntryShape};
    use std::fs;
    use tempfile::TempDir;

    fn create_temp_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path");
        (dir, path)
    }

    fn fast_config() -> WatcherConfig {
        WatcherConfig {
            debounce_ms: 50,
            ..WatcherConfig::default()
        }
    }

    fn test_pump<S: LaunchableShape>(
        shape: S,
        capacity: usize,
    ) -> (
        Pump<S>,
        mpsc::UnboundedSender<RawChange>,
        mpsc::Receiver<ChangeEvent>,
    ) {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let pump = Pump {
            shape: Arc::new(shape),
            strategy: WatchStrategy::Recursive,
            debouncer: Debouncer::new(Duration::from_millis(500)),
            raw_rx,
            out_tx,
            native: Weak::new(),
            cancel: CancellationToken::new(),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (pump, raw_tx, out_rx)
    }

    #[test]
    fn test_zero_buffer_is_rejected() {
        let config = WatcherConfig {
            event_buffer_size: 0,
            ..fast_config()
        };
        let result = FsWatcher::new(DesktopEntryShape, Vec::new(), &config);
        assert!(matches!(result, Err(WatchError::Config(_))));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (_guard, dir) = create_temp_dir();
        let watcher = FsWatcher::new(DesktopEntryShape, vec![dir], &fast_config()).unwrap();

        let _events = watcher.start().expect("Failed to start watcher");
        assert!(watcher.is_running());
        assert!(matches!(watcher.start(), Err(WatchError::AlreadyRunning)));

        watcher.stop().await;
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_no_watchable_directories() {
        let watcher = FsWatcher::new(
            DesktopEntryShape,
            vec![Utf8PathBuf::from("/nonexistent/path/that/does/not/exist")],
            &fast_config(),
        )
        .unwrap();

        match watcher.start() {
            Err(WatchError::NoWatchableDirectories { attempted }) => assert_eq!(attempted, 1),
            other => panic!("Expected NoWatchableDirectories, got {other:?}"),
        }
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_missing_directory_is_skipped() {
        let (_guard, dir) = create_temp_dir();
        let watcher = FsWatcher::new(
            DesktopEntryShape,
            vec![Utf8PathBuf::from("/nonexistent/apps"), dir],
            &fast_config(),
        )
        .unwrap();

        assert!(watcher.start().is_ok());
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_stop_closes_queue_and_is_idempotent() {
        let (_guard, dir) = create_temp_dir();
        let watcher = FsWatcher::new(DesktopEntryShape, vec![dir], &fast_config()).unwrap();

        let mut events = watcher.start().expect("Failed to start watcher");
        watcher.stop().await;
        watcher.stop().await;

        let next = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
        assert!(matches!(next, Ok(None)));
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (_guard, dir) = create_temp_dir();
        let watcher = FsWatcher::new(DesktopEntryShape, vec![dir], &fast_config()).unwrap();

        let _first = watcher.start().expect("Failed to start watcher");
        watcher.stop().await;
        let _second = watcher.start().expect("Failed to restart watcher");
        assert!(watcher.is_running());
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_add_watch_dir_records_and_dedups() {
        let (_guard, dir) = create_temp_dir();
        let watcher = FsWatcher::new(DesktopEntryShape, Vec::new(), &fast_config()).unwrap();

        watcher.add_watch_dir(dir.clone()).expect("add while stopped");
        watcher.add_watch_dir(dir.clone()).expect("add duplicate");
        assert_eq!(watcher.watch_dirs(), vec![dir.clone()]);

        let _events = watcher.start().expect("Failed to start watcher");
        let (_other_guard, other) = create_temp_dir();
        watcher.add_watch_dir(other.clone()).expect("add while running");
        assert_eq!(watcher.watch_dirs(), vec![dir, other]);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_add_missing_watch_dir_while_running_fails() {
        let (_guard, dir) = create_temp_dir();
        let watcher = FsWatcher::new(DesktopEntryShape, vec![dir], &fast_config()).unwrap();
        let _events = watcher.start().expect("Failed to start watcher");

        let err = watcher
            .add_watch_dir(Utf8PathBuf::from("/nonexistent/more-apps"))
            .unwrap_err();
        assert!(err.is_recoverable());
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_watcher_receives_added_event() {
        let (_guard, dir) = create_temp_dir();
        let watcher = FsWatcher::new(DesktopEntryShape, vec![dir.clone()], &fast_config()).unwrap();
        let mut events = watcher.start().expect("Failed to start watcher");

        fs::write(dir.join("editor.desktop"), "[Desktop Entry]\nName=Editor\n")
            .expect("Failed to write file");
        fs::write(dir.join("notes.txt"), "irrelevant").expect("Failed to write file");

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
        watcher.stop().await;

        // Timing-dependent on some CI filesystems
        if let Ok(Some(event)) = event {
            assert_eq!(event.path, dir.join("editor.desktop"));
            assert_eq!(event.kind, ChangeKind::Added);
        }
    }

    #[test]
    fn test_enqueue_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let dropped = AtomicU64::new(0);

        assert!(enqueue(&tx, ChangeEvent::added("/Apps/A.app"), &dropped));
        assert!(!enqueue(&tx, ChangeEvent::added("/Apps/B.app"), &dropped));
        assert_eq!(dropped.load(Ordering::Relaxed), 1);
        assert_eq!(rx.try_recv().ok(), Some(ChangeEvent::added("/Apps/A.app")));
    }

    #[test]
    fn test_collect_subdirs() {
        let (_guard, dir) = create_temp_dir();
        fs::create_dir_all(dir.join("a/b")).unwrap();
        fs::create_dir_all(dir.join(".hidden")).unwrap();
        fs::write(dir.join("a/file.lnk"), "").unwrap();

        let mut subdirs = collect_subdirs(&dir);
        subdirs.sort();
        assert_eq!(subdirs, vec![dir.join("a"), dir.join("a/b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_coalesces_rapid_writes() {
        let (_guard, dir) = create_temp_dir();
        let item = dir.join("editor.desktop");
        fs::write(&item, "").unwrap();

        let (pump, raw_tx, mut out_rx) = test_pump(DesktopEntryShape, 10);
        let cancel = pump.cancel.clone();
        let handle = tokio::spawn(pump.run());

        for _ in 0..5 {
            raw_tx
                .send(RawChange {
                    path: item.clone(),
                    op: RawOp::Write,
                })
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let event = out_rx.recv().await.expect("one debounced event");
        assert_eq!(event, ChangeEvent::modified(item));
        assert!(out_rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_maps_bundle_contents_to_root() {
        let (_guard, dir) = create_temp_dir();
        let bundle = dir.join("Foo.app");
        fs::create_dir_all(bundle.join("Contents")).unwrap();

        let (pump, raw_tx, mut out_rx) = test_pump(BundleShape::default(), 10);
        let handle = tokio::spawn(pump.run());

        raw_tx
            .send(RawChange {
                path: bundle.join("Contents/Info.plist"),
                op: RawOp::Create,
            })
            .unwrap();
        raw_tx
            .send(RawChange {
                path: dir.join("readme.txt"),
                op: RawOp::Create,
            })
            .unwrap();

        let event = out_rx.recv().await.expect("bundle event");
        assert_eq!(event, ChangeEvent::modified(bundle));

        // Closing the raw side stops the pump.
        drop(raw_tx);
        handle.await.unwrap();
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_reclassifies_vanished_item() {
        let (_guard, dir) = create_temp_dir();
        let (pump, raw_tx, mut out_rx) = test_pump(DesktopEntryShape, 10);
        let handle = tokio::spawn(pump.run());

        raw_tx
            .send(RawChange {
                path: dir.join("gone.desktop"),
                op: RawOp::Write,
            })
            .unwrap();

        let event = out_rx.recv().await.expect("event");
        assert_eq!(event, ChangeEvent::removed(dir.join("gone.desktop")));

        drop(raw_tx);
        handle.await.unwrap();
    }
}
