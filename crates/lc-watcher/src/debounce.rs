//! Per-path debouncing.
//!
//! Every relevant raw operation (re)arms a timer for its item. Only when the
//! timer runs out without being re-armed is the item's pending operation
//! released. Timers are plain deadlines polled by the pump task, so
//! cancelling the pump cancels every timer with it.

use std::time::Duration;

use camino::Utf8PathBuf;
use lc_core::{PathKey, PathKeyMap, path_key_map};
use tokio::time::Instant;

use crate::events::RawOp;

#[derive(Debug)]
struct Pending {
    path: Utf8PathBuf,
    op: RawOp,
    deadline: Instant,
}

/// Pending operations keyed by item.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: PathKeyMap<Pending>,
}

impl Debouncer {
    /// Creates a debouncer with the given quiet period.
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: path_key_map(),
        }
    }

    /// Records an operation at `now`, re-arming the item's timer.
    pub fn push(&mut self, path: Utf8PathBuf, op: RawOp, now: Instant) {
        let deadline = now + self.quiet;
        self.pending
            .entry(PathKey::new(&path))
            .and_modify(|pending| {
                pending.op = pending.op.merge(op);
                pending.deadline = deadline;
            })
            .or_insert(Pending { path, op, deadline });
    }

    /// The earliest armed deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Removes and returns every item whose timer ran out by `now`.
    pub fn drain_due(&mut self, now: Instant) -> Vec<(Utf8PathBuf, RawOp)> {
        let due: Vec<PathKey> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.into_iter()
            .filter_map(|key| self.pending.remove(&key))
            .map(|p| (p.path, p.op))
            .collect()
    }

    /// Number of armed timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no timer is armed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
