//! Suppression of repeated processing of the same path.

use std::time::Duration;

use lc_core::{PathKey, PathKeyMap, path_key_map};
use parking_lot::Mutex;
use tokio::time::Instant;

/// When each path was last processed.
///
/// A path marked within the dedup window is suppressed. Marks older than the
/// cleanup horizon are dropped by [`purge`](Self::purge).
#[derive(Debug)]
pub struct RecentlyProcessed {
    window: Duration,
    horizon: Duration,
    marks: Mutex<PathKeyMap<Instant>>,
}

impl RecentlyProcessed {
    /// Creates an empty set.
    #[must_use]
    pub fn new(window: Duration, horizon: Duration) -> Self {
        Self {
            window,
            horizon,
            marks: Mutex::new(path_key_map()),
        }
    }

    /// Marks `key` as processed at `now`.
    ///
    /// Returns `false`, leaving the existing mark alone, if `key` was already
    /// processed less than one window ago.
    pub fn try_mark(&self, key: PathKey, now: Instant) -> bool {
        let mut marks = self.marks.lock();
        if marks
            .get(&key)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        {
            return false;
        }
        marks.insert(key, now);
        true
    }

    /// Drops marks older than the cleanup horizon and returns how many.
    pub fn purge(&self, now: Instant) -> usize {
        let mut marks = self.marks.lock();
        let before = marks.len();
        marks.retain(|_, at| now.saturating_duration_since(*at) < self.horizon);
        before - marks.len()
    }

    /// Number of remembered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.lock().len()
    }

    /// Returns `true` if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    fn key(path: &str) -> PathKey {
        PathKey::new(Utf8Path::new(path))
    }

    fn recent() -> RecentlyProcessed {
        RecentlyProcessed::new(Duration::from_secs(5), Duration::from_secs(300))
    }

    #[test]
    fn test_second_event_inside_window_is_suppressed() {
        let recent = recent();
        let start = Instant::now();

        assert!(recent.try_mark(key("/Apps/Foo.app"), start));
        assert!(!recent.try_mark(key("/Apps/Foo.app"), start + Duration::from_secs(1)));
    }

    #[test]
    fn test_second_event_after_window_is_processed() {
        let recent = recent();
        let start = Instant::now();

        assert!(recent.try_mark(key("/Apps/Foo.app"), start));
        assert!(recent.try_mark(key("/Apps/Foo.app"), start + Duration::from_secs(6)));
    }

    #[test]
    fn test_suppressed_event_does_not_extend_window() {
        let recent = recent();
        let start = Instant::now();

        assert!(recent.try_mark(key("/Apps/Foo.app"), start));
        assert!(!recent.try_mark(key("/Apps/Foo.app"), start + Duration::from_secs(4)));
        assert!(recent.try_mark(key("/Apps/Foo.app"), start + Duration::from_secs(5)));
    }

    #[test]
    fn test_paths_are_independent() {
        let recent = recent();
        let now = Instant::now();
        assert!(recent.try_mark(key("/Apps/A.app"), now));
        assert!(recent.try_mark(key("/Apps/B.app"), now));
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_purge_drops_old_marks() {
        let recent = recent();
        let start = Instant::now();
        recent.try_mark(key("/Apps/Old.app"), start);
        recent.try_mark(key("/Apps/New.app"), start + Duration::from_secs(200));

        assert_eq!(recent.purge(start + Duration::from_secs(301)), 1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.purge(start + Duration::from_secs(600)), 1);
        assert!(recent.is_empty());
    }
}
