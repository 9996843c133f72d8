//! Staleness-driven reconciliation of the catalog with the disk.
//!
//! Native notifications can be missed (the engine was not running, the
//! queue overflowed, a volume was unmounted). The refresher periodically
//! re-checks entries that have not been verified for a while, and less often
//! looks for items that were never reported at all.

use std::io;
use std::sync::Arc;

use lc_catalog::CatalogStore;
use lc_core::{CatalogEntry, EntryId, PathKey, RefreshConfig, path_key_set_with_capacity};
use lc_scanner::Scanner;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::sink::ChangeSink;

/// Outcome of one refresher pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Entries looked at.
    pub checked: usize,
    /// Entries whose modification time had not moved.
    pub unchanged: usize,
    /// Entries parsed again and updated.
    pub updated: usize,
    /// Entries deleted.
    pub removed: usize,
    /// Items newly inserted.
    pub added: usize,
}

impl RefreshReport {
    /// Returns `true` if the catalog contents changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.updated + self.removed + self.added > 0
    }

    fn merge(self, other: Self) -> Self {
        Self {
            checked: self.checked + other.checked,
            unchanged: self.unchanged + other.unchanged,
            updated: self.updated + other.updated,
            removed: self.removed + other.removed,
            added: self.added + other.added,
        }
    }
}

/// Periodic staleness refresher.
#[derive(Debug)]
pub struct StalenessRefresher<C, S, K> {
    store: C,
    scanner: S,
    sink: K,
    config: RefreshConfig,
}

impl<C, S, K> StalenessRefresher<C, S, K>
where
    C: CatalogStore,
    S: Scanner,
    K: ChangeSink,
{
    /// Creates a refresher after validating `config`.
    pub fn new(config: RefreshConfig, store: C, scanner: S, sink: K) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            store,
            scanner,
            sink,
            config,
        })
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Re-verifies every entry not verified within `stale_after`.
    ///
    /// Missing items are deleted, items with an unchanged modification time
    /// are re-stamped, and changed items are parsed again (deleted if that
    /// fails). Updates and deletions are each applied in one batch; an entry
    /// removed by someone else meanwhile stays removed. Blocking.
    pub fn refresh_stale(&self) -> Result<RefreshReport, SyncError> {
        let stale = self.store.find_stale(self.config.stale_after())?;
        let mut report = RefreshReport {
            checked: stale.len(),
            ..RefreshReport::default()
        };

        let mut touched: Vec<EntryId> = Vec::new();
        let mut updated: Vec<CatalogEntry> = Vec::new();
        let mut deleted: Vec<EntryId> = Vec::new();

        for entry in stale {
            match lc_core::fs::modified_at(&entry.path) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(path = %entry.path, "stale entry is gone");
                    deleted.push(entry.id);
                }
                Err(err) => {
                    tracing::warn!(path = %entry.path, error = %err, "cannot stat stale entry, keeping it");
                }
                Ok(modified) if modified == entry.dir_updated_at => touched.push(entry.id),
                Ok(_) => match self.scanner.parse(&entry.path) {
                    Ok(mut fresh) => {
                        fresh.inherit_identity(&entry);
                        updated.push(fresh);
                    }
                    Err(err) => {
                        tracing::debug!(path = %entry.path, error = %err, "stale entry no longer parses");
                        deleted.push(entry.id);
                    }
                },
            }
        }

        report.unchanged = self.store.touch_batch(&touched)?;
        report.updated = self.store.update_batch(&updated)?;
        report.removed = self.store.delete_batch(&deleted)?;

        if report.changed() {
            self.sink.catalog_changed();
        }
        tracing::info!(
            checked = report.checked,
            unchanged = report.unchanged,
            updated = report.updated,
            removed = report.removed,
            "stale entries refreshed"
        );
        Ok(report)
    }

    /// Inserts every discovered item that is not cataloged yet. Items that
    /// fail to parse are skipped. Blocking.
    pub fn discover_new(&self) -> Result<RefreshReport, SyncError> {
        let known = self.store.list()?;
        let mut seen = path_key_set_with_capacity(known.len());
        seen.extend(known.iter().map(CatalogEntry::path_key));

        let discovered = self.scanner.discover()?;
        let mut report = RefreshReport {
            checked: discovered.len(),
            ..RefreshReport::default()
        };

        let mut fresh = Vec::new();
        for path in discovered {
            if !seen.insert(PathKey::new(&path)) {
                report.unchanged += 1;
                continue;
            }
            match self.scanner.parse(&path) {
                Ok(entry) => fresh.push(entry),
                Err(err) => tracing::debug!(path = %path, error = %err, "skipping undiscoverable item"),
            }
        }

        report.added = self.store.upsert_batch(&fresh)?;
        if report.changed() {
            self.sink.catalog_changed();
        }
        tracing::info!(checked = report.checked, added = report.added, "discovery finished");
        Ok(report)
    }

    /// Fills an empty catalog from discovery. Does nothing otherwise.
    /// Blocking.
    pub fn populate_if_empty(&self) -> Result<RefreshReport, SyncError> {
        if !self.store.is_empty()? {
            return Ok(RefreshReport::default());
        }
        tracing::info!("catalog is empty, running initial population");
        self.discover_new()
    }

    /// One stale pass followed by discovery. Blocking.
    pub fn refresh_all(&self) -> Result<RefreshReport, SyncError> {
        let stale = self.refresh_stale()?;
        let discovered = self.discover_new()?;
        Ok(stale.merge(discovered))
    }

    /// Runs the ticker loop until `cancel` fires.
    ///
    /// Waits `initial_delay`, then refreshes stale entries every `interval`
    /// and runs discovery whenever `discover_interval` has elapsed since the
    /// last discovery. Failures are logged and the loop continues.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(self.config.initial_delay()) => {}
        }

        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_discovery = Instant::now();

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let discover = last_discovery.elapsed() >= self.config.discover_interval();
            if discover {
                last_discovery = Instant::now();
            }

            let refresher = Arc::clone(&self);
            let pass = tokio::task::spawn_blocking(move || -> Result<RefreshReport, SyncError> {
                let stale = refresher.refresh_stale()?;
                if discover {
                    Ok(stale.merge(refresher.discover_new()?))
                } else {
                    Ok(stale)
                }
            })
            .await;

            match pass {
                Ok(Ok(report)) => tracing::debug!(?report, "refresh pass finished"),
                Ok(Err(err)) => tracing::warn!(error = %err, "refresh pass failed"),
                Err(err) => tracing::warn!(error = %err, "refresh task terminated abnormally"),
            }
        }
        tracing::debug!("refresher stopped");
    }
}
