//! Catalog synchronization engine.
//!
//! Keeps a persisted catalog of launchable items consistent with the disk,
//! using change notifications where they are available and a staleness
//! driven reconciliation as the fallback.
//!
//! # Overview
//!
//! - [`WatchManager`] consumes [`ChangeEvent`](lc_watcher::ChangeEvent)s,
//!   suppresses near-duplicates, runs each through the [`RetryExecutor`] and
//!   records [`MetricsSnapshot`] metrics
//! - [`CatalogReconciler`] applies parsed entries to a
//!   [`CatalogStore`](lc_catalog::CatalogStore), keyed by path
//! - [`StalenessRefresher`] re-verifies entries nobody reported on for a
//!   while and discovers items that were never reported
//! - [`Coordinator`] owns all of the above and is what applications use
//!
//! # Crate Dependencies
//!
//! ```text
//! lc-cli ──► lc-sync ──► lc-watcher ──► lc-core
//!                    ├─► lc-scanner ──►
//!                    └─► lc-catalog ──►
//! ```
//!
//! # Concurrency
//!
//! Every background task (event loop, dedup cleanup, refresher ticker) is
//! tied to a [`CancellationToken`](tokio_util::sync::CancellationToken), and
//! every `stop()` awaits the tasks it owns. Blocking scanner and store calls
//! run on Tokio's blocking pool.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod handler;
pub mod manager;
pub mod metrics;
pub mod refresher;
pub mod retry;
pub mod sink;

pub use coordinator::{Coordinator, WatchStatus};
pub use dedup::RecentlyProcessed;
pub use error::{Retryable, SyncError};
pub use handler::{CatalogReconciler, EventHandler};
pub use manager::WatchManager;
pub use metrics::{MetricsSnapshot, WatcherMetrics};
pub use refresher::{RefreshReport, StalenessRefresher};
pub use retry::{DefaultRetryPolicy, RetryError, RetryExecutor, RetryPolicy};
pub use sink::{BroadcastSink, CatalogChanged, ChangeSink, ErrorSink, TracingErrorSink};
