//! The engine owner.
//!
//! [`Coordinator`] wires one change source, one scanner and one catalog store
//! into a [`WatchManager`] and a [`StalenessRefresher`], and is the only
//! thing callers talk to. It is constructed explicitly and holds no global
//! state.

use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::Utc;
use lc_catalog::CatalogStore;
use lc_core::{CatalogEntry, Config, EntryId, RefreshConfig, UsageStats, WatcherConfig};
use lc_scanner::Scanner;
use lc_watcher::ChangeSource;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::handler::CatalogReconciler;
use crate::manager::WatchManager;
use crate::metrics::MetricsSnapshot;
use crate::refresher::{RefreshReport, StalenessRefresher};
use crate::sink::{BroadcastSink, CatalogChanged, ChangeSink, TracingErrorSink};

type Reconciler<C> = CatalogReconciler<Arc<C>, Arc<BroadcastSink>>;
type Refresher<C, S> = StalenessRefresher<Arc<C>, Arc<S>, Arc<BroadcastSink>>;

/// Watch state reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct WatchStatus {
    /// Whether watching is enabled in the configuration.
    pub enabled: bool,
    /// Whether the watch manager is running.
    pub running: bool,
    /// Directories being watched.
    pub watch_dirs: Vec<Utf8PathBuf>,
    /// Active watcher configuration.
    pub config: WatcherConfig,
    /// Current metrics.
    pub metrics: MetricsSnapshot,
}

struct Background {
    cancel: CancellationToken,
    refresher: Option<JoinHandle<()>>,
}

/// Owns the synchronization engine.
///
/// # Examples
///
/// ```no_run
/// use lc_catalog::SqliteCatalog;
/// use lc_core::{Config, PlatformShape};
/// use lc_scanner::FsScanner;
/// use lc_sync::Coordinator;
/// use lc_watcher::FsWatcher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let dirs = config.watcher.watch_dirs(&PlatformShape::default());
///
/// let coordinator = Coordinator::new(
///     &config,
///     FsWatcher::new(PlatformShape::default(), dirs.clone(), &config.watcher)?,
///     SqliteCatalog::open_in_memory()?,
///     FsScanner::new(PlatformShape::default(), dirs),
/// )?;
///
/// coordinator.start().await?;
/// let mut changes = coordinator.subscribe();
/// while changes.recv().await.is_ok() {
///     println!("{} entries", coordinator.entries()?.len());
/// }
/// coordinator.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Coordinator<W, C, S> {
    watcher_config: WatcherConfig,
    refresh_config: RefreshConfig,
    store: Arc<C>,
    scanner: Arc<S>,
    sink: Arc<BroadcastSink>,
    manager: WatchManager<W, S, Reconciler<C>, TracingErrorSink>,
    refresher: Arc<Refresher<C, S>>,
    background: Mutex<Option<Background>>,
}

impl<W, C, S> std::fmt::Debug for Coordinator<W, C, S>
where
    W: ChangeSource,
    C: CatalogStore,
    S: Scanner,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("manager", &self.manager)
            .field("refresh_config", &self.refresh_config)
            .finish_non_exhaustive()
    }
}

impl<W, C, S> Coordinator<W, C, S>
where
    W: ChangeSource,
    C: CatalogStore,
    S: Scanner,
{
    /// Builds a stopped engine after validating `config`.
    pub fn new(config: &Config, source: W, store: C, scanner: S) -> Result<Self, SyncError> {
        config.validate()?;
        let store = Arc::new(store);
        let scanner = Arc::new(scanner);
        let sink = Arc::new(BroadcastSink::default());

        let handler = Arc::new(CatalogReconciler::new(
            Arc::clone(&store),
            Arc::clone(&sink),
        ));
        let manager = WatchManager::new(
            config.watcher.clone(),
            source,
            Arc::clone(&scanner),
            handler,
            TracingErrorSink,
        )?;
        let refresher = StalenessRefresher::new(
            config.refresh.clone(),
            Arc::clone(&store),
            Arc::clone(&scanner),
            Arc::clone(&sink),
        )?;

        Ok(Self {
            watcher_config: config.watcher.clone(),
            refresh_config: config.refresh.clone(),
            store,
            scanner,
            sink,
            manager,
            refresher: Arc::new(refresher),
            background: Mutex::new(None),
        })
    }

    /// Starts the engine.
    ///
    /// Populates an empty catalog, starts watching when enabled and spawns
    /// the refresher. A watcher that cannot start is logged and the engine
    /// runs on periodic refresh alone.
    pub async fn start(&self) -> Result<(), SyncError> {
        let cancel = {
            let mut background = self.background.lock();
            if background.is_some() {
                return Err(SyncError::AlreadyRunning);
            }
            let cancel = CancellationToken::new();
            *background = Some(Background {
                cancel: cancel.clone(),
                refresher: None,
            });
            cancel
        };

        let refresher = Arc::clone(&self.refresher);
        let population = match tokio::task::spawn_blocking(move || refresher.populate_if_empty()).await
        {
            Ok(population) => population,
            Err(err) => {
                self.background.lock().take();
                return Err(err.into());
            }
        };
        match population {
            Ok(report) if report.added > 0 => {
                tracing::info!(added = report.added, "initial catalog population finished");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "initial catalog population failed"),
        }

        if self.watcher_config.enabled {
            if let Err(err) = self.manager.start() {
                tracing::warn!(error = %err, "file watching unavailable, relying on periodic refresh");
            }
        } else {
            tracing::info!("file watching disabled");
        }

        if self.refresh_config.enabled {
            let handle = tokio::spawn(Arc::clone(&self.refresher).run(cancel));
            if let Some(background) = self.background.lock().as_mut() {
                background.refresher = Some(handle);
            }
        }
        Ok(())
    }

    /// Stops watching and refreshing; returns once every task finished.
    /// Idempotent.
    pub async fn stop(&self) {
        let background = self.background.lock().take();
        let Some(background) = background else {
            return;
        };

        background.cancel.cancel();
        self.manager.stop().await;
        if let Some(handle) = background.refresher {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "refresher terminated abnormally");
            }
        }
        tracing::info!("synchronization engine stopped");
    }

    /// Every entry, with the scanner's default icon filled in where an
    /// entry declares none. An empty catalog is populated from discovery
    /// first, so this also works on an engine that was never started.
    /// Blocking.
    pub fn entries(&self) -> Result<Vec<CatalogEntry>, SyncError> {
        if let Err(err) = self.refresher.populate_if_empty() {
            tracing::warn!(error = %err, "populating empty catalog failed");
        }
        let default_icon = self.scanner.default_icon_path();
        let mut entries = self.store.list()?;
        for entry in &mut entries {
            if entry.icon_path.is_none() {
                entry.icon_path = Some(default_icon.clone());
            }
        }
        Ok(entries)
    }

    /// Current watch state.
    #[must_use]
    pub fn status(&self) -> WatchStatus {
        WatchStatus {
            enabled: self.watcher_config.enabled,
            running: self.manager.is_running(),
            watch_dirs: self.manager.watch_dirs(),
            config: self.watcher_config.clone(),
            metrics: self.manager.metrics(),
        }
    }

    /// Subscribes to catalog change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogChanged> {
        self.sink.subscribe()
    }

    /// Runs a stale pass and discovery right away.
    pub async fn refresh_now(&self) -> Result<RefreshReport, SyncError> {
        let refresher = Arc::clone(&self.refresher);
        tokio::task::spawn_blocking(move || refresher.refresh_all()).await?
    }

    /// Records a launch of entry `id`. Blocking.
    pub fn record_launch(&self, id: &EntryId) -> Result<UsageStats, SyncError> {
        let usage = self.store.record_launch(id, Utc::now())?;
        self.sink.catalog_changed();
        Ok(usage)
    }

    /// The watch manager.
    #[must_use]
    pub const fn manager(&self) -> &WatchManager<W, S, Reconciler<C>, TracingErrorSink> {
        &self.manager
    }

    /// The catalog store.
    #[must_use]
    pub fn store(&self) -> &C {
        &self.store
    }
}
