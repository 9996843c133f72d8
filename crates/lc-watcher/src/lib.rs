//! Filesystem watching for launchable items.
//!
//! This crate turns native filesystem notifications into debounced,
//! classified [`ChangeEvent`]s about launchable items (bundles, shortcuts,
//! desktop entries) and streams them through a bounded queue.
//!
//! # Overview
//!
//! - Watches every configured directory the way the platform shape wants
//!   (recursively, top level only, or one watch per subdirectory)
//! - Maps any path inside a bundle to the bundle root
//! - Debounces bursts per item and classifies the result as added, removed
//!   or modified, checking the filesystem when the raw operation is
//!   ambiguous
//! - Never blocks the native callback; a full queue drops and counts
//!
//! # Crate Dependencies
//!
//! ```text
//! lc-cli ──► lc-sync ──► lc-watcher ──► lc-core
//!                    ├─► lc-scanner ──►
//!                    └─► lc-catalog ──►
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use lc_core::{DesktopEntryShape, WatcherConfig};
//! use lc_watcher::{ChangeKind, ChangeSource, FsWatcher};
//!
//! # async fn example() -> Result<(), lc_watcher::WatchError> {
//! let config = WatcherConfig::default();
//! let watcher = FsWatcher::new(
//!     DesktopEntryShape,
//!     vec!["/usr/share/applications".into()],
//!     &config,
//! )?;
//!
//! let mut events = watcher.start()?;
//! while let Some(event) = events.recv().await {
//!     match event.kind {
//!         ChangeKind::Added => println!("new app at {}", event.path),
//!         ChangeKind::Removed => println!("{} is gone", event.path),
//!         ChangeKind::Modified => println!("{} changed", event.path),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Consumers that only need a stream of events should depend on the
//! [`ChangeSource`] trait; [`ManualSource`] implements it for tests.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod debounce;
pub mod error;
pub mod events;
pub mod source;
pub mod testing;
pub mod watcher;

pub use error::WatchError;
pub use events::{ChangeEvent, ChangeKind, RawOp, classify};
pub use source::ChangeSource;
pub use testing::ManualSource;
pub use watcher::FsWatcher;
