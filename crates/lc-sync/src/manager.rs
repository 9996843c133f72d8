//! Watch manager: lifecycle and consumption of change events.
//!
//! # Architecture
//!
//! ```text
//!  ChangeSource ──► mpsc::Receiver<ChangeEvent>
//!                           │
//!                           ▼
//!  ┌─────────────────── event loop ───────────────────┐
//!  │ RecentlyProcessed::try_mark ─► metrics           │
//!  │ RetryExecutor { delay ─► parse ─► EventHandler } │──► ErrorSink
//!  └──────────────────────────────────────────────────┘
//!
//!  cleanup loop: every horizon ─► RecentlyProcessed::purge
//! ```
//!
//! Both loops share one [`CancellationToken`]; [`WatchManager::stop`]
//! cancels it, stops the source and awaits both loops.

use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::Utc;
use lc_core::{ProcessDelayConfig, WatcherConfig};
use lc_scanner::Scanner;
use lc_watcher::{ChangeEvent, ChangeKind, ChangeSource};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::dedup::RecentlyProcessed;
use crate::error::SyncError;
use crate::handler::EventHandler;
use crate::metrics::{MetricsSnapshot, WatcherMetrics};
use crate::retry::{DefaultRetryPolicy, RetryExecutor};
use crate::sink::ErrorSink;

/// Everything the background loops need.
struct Shared<S, H, E> {
    scanner: Arc<S>,
    handler: Arc<H>,
    errors: E,
    delays: ProcessDelayConfig,
    executor: RetryExecutor,
    policy: DefaultRetryPolicy,
    recent: RecentlyProcessed,
    metrics: WatcherMetrics,
}

struct Loops {
    cancel: CancellationToken,
    events: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

/// Owns a change source and turns its events into catalog updates.
pub struct WatchManager<W, S, H, E> {
    config: WatcherConfig,
    source: W,
    shared: Arc<Shared<S, H, E>>,
    loops: Mutex<Option<Loops>>,
}

impl<W, S, H, E> std::fmt::Debug for WatchManager<W, S, H, E>
where
    W: ChangeSource,
    S: Scanner,
    H: EventHandler,
    E: ErrorSink,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchManager")
            .field("config", &self.config)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<W, S, H, E> WatchManager<W, S, H, E>
where
    W: ChangeSource,
    S: Scanner,
    H: EventHandler,
    E: ErrorSink,
{
    /// Creates a stopped manager after validating `config`.
    pub fn new(
        config: WatcherConfig,
        source: W,
        scanner: Arc<S>,
        handler: Arc<H>,
        errors: E,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let shared = Shared {
            scanner,
            handler,
            errors,
            delays: config.process_delay,
            executor: RetryExecutor::from_config(&config.retry),
            policy: DefaultRetryPolicy::from_config(&config.retry),
            recent: RecentlyProcessed::new(config.dedup_window(), config.cleanup_horizon()),
            metrics: WatcherMetrics::new(),
        };
        Ok(Self {
            config,
            source,
            shared: Arc::new(shared),
            loops: Mutex::new(None),
        })
    }

    /// Starts the source and both background loops.
    ///
    /// If the source fails to start, the error is returned and the manager
    /// stays stopped. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), SyncError> {
        let mut loops = self.loops.lock();
        if loops.is_some() {
            return Err(SyncError::AlreadyRunning);
        }

        let receiver = self.source.start()?;
        self.shared.metrics.mark_started(Utc::now());

        let cancel = CancellationToken::new();
        let events = tokio::spawn(run_events(
            Arc::clone(&self.shared),
            receiver,
            cancel.clone(),
        ));
        let cleanup = tokio::spawn(run_cleanup(
            Arc::clone(&self.shared),
            cancel.clone(),
            self.config.cleanup_horizon(),
        ));
        *loops = Some(Loops {
            cancel,
            events,
            cleanup,
        });

        tracing::info!(dirs = self.source.watch_dirs().len(), "watch manager started");
        Ok(())
    }

    /// Stops both loops and the source; returns once every task finished.
    /// Idempotent.
    pub async fn stop(&self) {
        let loops = self.loops.lock().take();
        let Some(loops) = loops else {
            return;
        };

        loops.cancel.cancel();
        self.source.stop().await;
        for (name, handle) in [("event", loops.events), ("cleanup", loops.cleanup)] {
            if let Err(err) = handle.await {
                tracing::warn!(task = name, error = %err, "watch loop terminated abnormally");
            }
        }
        tracing::info!("watch manager stopped");
    }

    /// Returns `true` between a successful `start()` and `stop()`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.loops.lock().is_some()
    }

    /// The watched directories.
    #[must_use]
    pub fn watch_dirs(&self) -> Vec<Utf8PathBuf> {
        self.source.watch_dirs()
    }

    /// Adds a directory to watch.
    pub fn add_watch_dir(&self, dir: Utf8PathBuf) -> Result<(), SyncError> {
        self.source.add_watch_dir(dir)?;
        Ok(())
    }

    /// A snapshot of the metrics.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared
            .metrics
            .snapshot(self.source.dropped_events(), Utc::now())
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// The change source.
    #[must_use]
    pub const fn source(&self) -> &W {
        &self.source
    }
}

async fn run_events<S, H, E>(
    shared: Arc<Shared<S, H, E>>,
    mut receiver: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
) where
    S: Scanner,
    H: EventHandler,
    E: ErrorSink,
{
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        shared.process(event).await;
    }
    tracing::debug!("event loop finished");
}

async fn run_cleanup<S, H, E>(
    shared: Arc<Shared<S, H, E>>,
    cancel: CancellationToken,
    period: std::time::Duration,
) where
    S: Scanner,
    H: EventHandler,
    E: ErrorSink,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let purged = shared.recent.purge(Instant::now());
                if purged > 0 {
                    tracing::debug!(purged, "purged processed-path records");
                }
            }
        }
    }
}

impl<S, H, E> Shared<S, H, E>
where
    S: Scanner,
    H: EventHandler,
    E: ErrorSink,
{
    async fn process(&self, event: ChangeEvent) {
        if !self.recent.try_mark(event.path_key(), Instant::now()) {
            tracing::debug!(kind = %event.kind, path = %event.path, "recently processed, skipping");
            return;
        }
        self.metrics.record_event(event.kind, Utc::now());

        let started = Instant::now();
        let event_ref = &event;
        let result = self
            .executor
            .execute(&self.policy, move || self.handle(event_ref))
            .await;
        self.metrics.record_duration(started.elapsed());

        match result {
            Ok(()) => self.metrics.record_processed(),
            Err(err) => {
                self.metrics.record_error();
                self.errors.report(&err, &event);
            }
        }
    }

    /// One attempt at handling `event`. The configured delay is part of
    /// every attempt.
    async fn handle(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let path = event.path.clone();
        match event.kind {
            ChangeKind::Added => {
                tokio::time::sleep(self.delays.added()).await;
                self.blocking(move |scanner, handler| {
                    let entry = scanner.parse(&path)?;
                    handler.on_added(entry)
                })
                .await
            }
            ChangeKind::Removed => {
                self.blocking(move |_, handler| handler.on_removed(&path))
                    .await
            }
            ChangeKind::Modified => {
                tokio::time::sleep(self.delays.modified()).await;
                self.blocking(move |scanner, handler| match scanner.parse(&path) {
                    Ok(entry) => handler.on_modified(entry),
                    Err(err) if err.is_retryable() => Err(err.into()),
                    Err(err) => {
                        tracing::debug!(path = %path, error = %err, "re-parse failed, treating as removed");
                        handler.on_removed(&path)
                    }
                })
                .await
            }
        }
    }

    async fn blocking<F>(&self, work: F) -> Result<(), SyncError>
    where
        F: FnOnce(&S, &H) -> Result<(), SyncError> + Send + 'static,
    {
        let scanner = Arc::clone(&self.scanner);
        let handler = Arc::clone(&self.handler);
        tokio::task::spawn_blocking(move || work(&*scanner, &*handler)).await?
    }
}
