//! Outbound notifications: catalog changes and unrecoverable event errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lc_watcher::ChangeEvent;
use tokio::sync::broadcast;

use crate::error::SyncError;
use crate::retry::RetryError;

/// Notification that the catalog contents changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogChanged {
    /// When the change was committed.
    pub at: DateTime<Utc>,
}

/// Receives "catalog changed" notifications. Must not block.
pub trait ChangeSink: Send + Sync + 'static {
    /// Called after a committed change to the catalog.
    fn catalog_changed(&self);
}

impl<T: ChangeSink> ChangeSink for Arc<T> {
    fn catalog_changed(&self) {
        self.as_ref().catalog_changed();
    }
}

/// Fans catalog change notifications out to any number of subscribers.
///
/// Slow subscribers lag instead of blocking the sender.
///
/// # Examples
///
/// ```
/// use lc_sync::{BroadcastSink, ChangeSink};
///
/// let sink = BroadcastSink::new(16);
/// let mut changes = sink.subscribe();
/// sink.catalog_changed();
/// assert!(changes.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<CatalogChanged>,
}

impl BroadcastSink {
    /// Creates a sink buffering up to `capacity` notifications per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogChanged> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeSink for BroadcastSink {
    fn catalog_changed(&self) {
        if self.tx.send(CatalogChanged { at: Utc::now() }).is_err() {
            tracing::trace!("catalog changed, no subscribers");
        }
    }
}

/// Receives events whose handling failed on every attempt.
pub trait ErrorSink: Send + Sync + 'static {
    /// Reports the final failure for `event`.
    fn report(&self, err: &RetryError<SyncError>, event: &ChangeEvent);
}

impl<T: ErrorSink> ErrorSink for Arc<T> {
    fn report(&self, err: &RetryError<SyncError>, event: &ChangeEvent) {
        self.as_ref().report(err, event);
    }
}

/// Logs failed events at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: &RetryError<SyncError>, event: &ChangeEvent) {
        tracing::error!(
            kind = %event.kind,
            path = %event.path,
            attempts = err.attempts,
            error = %err.source,
            "failed to handle change event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_is_notified() {
        let sink = BroadcastSink::new(4);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        sink.catalog_changed();
        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }

    #[test]
    fn test_no_subscribers_is_fine() {
        let sink = BroadcastSink::default();
        sink.catalog_changed();
        assert_eq!(sink.subscriber_count(), 0);
    }
}
