//! Watch metrics with atomic counters.
//!
//! [`WatcherMetrics`] is owned by the watch manager and updated from its
//! event loop; readers only ever see a [`MetricsSnapshot`].
//!
//! # Thread Safety
//!
//! Counters use [`AtomicU64`] with relaxed ordering; timestamps sit behind a
//! small mutex. A snapshot is not a perfectly consistent cut across
//! counters, which is fine for status display.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lc_watcher::ChangeKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy)]
struct Timestamps {
    started_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
}

/// Live counters of the watch manager.
#[derive(Debug, Default)]
pub struct WatcherMetrics {
    processed: AtomicU64,
    errors: AtomicU64,
    added: AtomicU64,
    removed: AtomicU64,
    modified: AtomicU64,
    processing_micros: AtomicU64,
    times: Mutex<Timestamps>,
}

impl WatcherMetrics {
    /// Creates zeroed metrics.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of watching.
    pub fn mark_started(&self, at: DateTime<Utc>) {
        self.times.lock().started_at = Some(at);
    }

    /// Counts an event that passed deduplication.
    pub fn record_event(&self, kind: ChangeKind, at: DateTime<Utc>) {
        let counter = match kind {
            ChangeKind::Added => &self.added,
            ChangeKind::Removed => &self.removed,
            ChangeKind::Modified => &self.modified,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.times.lock().last_event_at = Some(at);
    }

    /// Counts an event handled successfully.
    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an event that failed on every attempt.
    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds to the cumulative processing time.
    pub fn record_duration(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processing_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Zeroes every counter and forgets both timestamps.
    pub fn reset(&self) {
        for counter in [
            &self.processed,
            &self.errors,
            &self.added,
            &self.removed,
            &self.modified,
            &self.processing_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.times.lock() = Timestamps::default();
    }

    /// Takes a snapshot. `dropped` is the change source's own overflow
    /// counter, which these metrics do not own.
    #[must_use]
    pub fn snapshot(&self, dropped: u64, now: DateTime<Utc>) -> MetricsSnapshot {
        let times = *self.times.lock();
        let processed = self.processed.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let total_processing_ms = self.processing_micros.load(Ordering::Relaxed) / 1_000;
        let handled = processed + errors;

        MetricsSnapshot {
            events_processed: processed,
            events_dropped: dropped,
            errors,
            added: self.added.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            modified: self.modified.load(Ordering::Relaxed),
            total_processing_ms,
            average_processing_ms: if handled == 0 {
                0
            } else {
                total_processing_ms / handled
            },
            last_event_at: times.last_event_at,
            started_at: times.started_at,
            uptime_secs: times
                .started_at
                .and_then(|start| (now - start).to_std().ok())
                .map_or(0, |uptime| uptime.as_secs()),
        }
    }
}

/// Point-in-time view of [`WatcherMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Events handled successfully.
    pub events_processed: u64,
    /// Events dropped because the queue was full.
    pub events_dropped: u64,
    /// Events that failed on every attempt.
    pub errors: u64,
    /// `Added` events seen.
    pub added: u64,
    /// `Removed` events seen.
    pub removed: u64,
    /// `Modified` events seen.
    pub modified: u64,
    /// Cumulative handling time, including retries and delays.
    pub total_processing_ms: u64,
    /// Mean handling time per finished event.
    pub average_processing_ms: u64,
    /// When the last event passed deduplication.
    pub last_event_at: Option<DateTime<Utc>>,
    /// When watching started.
    pub started_at: Option<DateTime<Utc>>,
    /// Seconds since `started_at`.
    pub uptime_secs: u64,
}

impl MetricsSnapshot {
    /// Events that passed deduplication.
    #[must_use]
    pub const fn events_seen(&self) -> u64 {
        self.added + self.removed + self.modified
    }
}
