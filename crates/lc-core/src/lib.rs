//! Core types, launchable shapes, and configuration for launchcat.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Domain types ([`CatalogEntry`], [`EntryId`], [`PathKey`], [`UsageStats`])
//! - Launchable shapes describing how each platform stores applications
//! - Configuration structures ([`WatcherConfig`], [`RefreshConfig`], [`Config`])
//! - [`ConfigError`] for configuration failures
//! - Type aliases for `FxHashMap`/`FxHashSet`
//!
//! # Crate Dependencies
//!
//! ```text
//! lc-cli ──► lc-sync ──► lc-watcher ──► lc-core
//!                    ├─► lc-scanner ──►
//!                    └─► lc-catalog ──►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod fs;
pub mod hash;
pub mod shape;
pub mod types;

pub use config::{
    Config, MAX_RETRIES_LIMIT, ProcessDelayConfig, RefreshConfig, RetryConfig, WatcherConfig,
    default_catalog_path,
};
pub use error::ConfigError;
pub use hash::{
    FxHashMap, FxHashSet, PathKeyMap, PathKeySet, path_key_map, path_key_set_with_capacity,
};
pub use shape::{
    BundleShape, DesktopEntryShape, LaunchableShape, PlatformShape, ShortcutShape, WatchStrategy,
};
pub use types::{CatalogEntry, EntryId, PathKey, UsageStats};
