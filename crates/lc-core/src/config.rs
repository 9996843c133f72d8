//! Configuration structures for launchcat.
//!
//! - [`WatcherConfig`] - Filesystem watching, debouncing, retry and dedup policy
//! - [`RefreshConfig`] - Staleness-driven background refresh
//! - [`Config`] - Root configuration, loadable from a JSON file
//!
//! All types implement [`Default`] and use `#[serde(default)]`, so a partial
//! JSON document only needs the options it overrides. Values are checked by
//! `validate()`; out-of-range values are rejected, never clamped.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hash::path_key_set_with_capacity;
use crate::shape::LaunchableShape;
use crate::types::PathKey;

/// Upper bound on `retry.max_retries`. Exponential backoff doubles per
/// retry, so larger values produce delays measured in days.
pub const MAX_RETRIES_LIMIT: u32 = 16;

/// Delays applied before handling an event, giving installers time to finish
/// writing an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessDelayConfig {
    /// Delay before handling an `Added` event, in milliseconds.
    pub added_ms: u64,
    /// Delay before handling a `Modified` event, in milliseconds.
    pub modified_ms: u64,
}

impl Default for ProcessDelayConfig {
    fn default() -> Self {
        Self {
            added_ms: 500,
            modified_ms: 300,
        }
    }
}

impl ProcessDelayConfig {
    /// Delay before handling an `Added` event.
    #[inline]
    #[must_use]
    pub const fn added(&self) -> Duration {
        Duration::from_millis(self.added_ms)
    }

    /// Delay before handling a `Modified` event.
    #[inline]
    #[must_use]
    pub const fn modified(&self) -> Duration {
        Duration::from_millis(self.modified_ms)
    }
}

/// Retry policy for event handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Base delay between attempts, in milliseconds.
    pub retry_interval_ms: u64,
    /// Double the delay before each further retry.
    pub exponential_backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval_ms: 1000,
            exponential_backoff: true,
        }
    }
}

impl RetryConfig {
    /// Base delay between attempts.
    #[inline]
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Configuration for the filesystem watch pipeline.
///
/// # Examples
///
/// ```
/// use lc_core::WatcherConfig;
///
/// let config = WatcherConfig::default();
/// assert_eq!(config.debounce_ms, 500);
/// assert_eq!(config.event_buffer_size, 100);
/// assert!(config.validate().is_ok());
///
/// let broken = WatcherConfig { event_buffer_size: 0, ..WatcherConfig::default() };
/// assert!(broken.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Whether filesystem watching runs at all. When disabled, only the
    /// background refresher keeps the catalog current.
    pub enabled: bool,

    /// Watch the platform's conventional application directories.
    pub include_default_dirs: bool,

    /// Additional directories to watch.
    pub extra_watch_dirs: Vec<Utf8PathBuf>,

    /// Quiet period a path must observe before its change is emitted.
    pub debounce_ms: u64,

    /// Capacity of the change-event queue. Events arriving while the queue
    /// is full are dropped and counted.
    pub event_buffer_size: usize,

    /// Per-kind processing delays.
    pub process_delay: ProcessDelayConfig,

    /// Retry policy for event handling.
    pub retry: RetryConfig,

    /// A path processed within this window is not processed again.
    pub dedup_window_ms: u64,

    /// Dedup records older than this are purged, and the purge runs this
    /// often.
    pub cleanup_horizon_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_default_dirs: true,
            extra_watch_dirs: Vec::new(),
            debounce_ms: 500,
            event_buffer_size: 100,
            process_delay: ProcessDelayConfig::default(),
            retry: RetryConfig::default(),
            dedup_window_ms: 5_000,
            cleanup_horizon_ms: 300_000,
        }
    }
}

impl WatcherConfig {
    /// Debounce quiet period.
    #[inline]
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Dedup window.
    #[inline]
    #[must_use]
    pub const fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    /// Cleanup horizon and sweep period.
    #[inline]
    #[must_use]
    pub const fn cleanup_horizon(&self) -> Duration {
        Duration::from_millis(self.cleanup_horizon_ms)
    }

    /// Checks every option.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] naming the first offending
    /// option when:
    ///
    /// - `event_buffer_size` is zero
    /// - `debounce_ms` is not shorter than `dedup_window_ms`
    /// - `dedup_window_ms` exceeds `cleanup_horizon_ms`
    /// - `retry.max_retries` exceeds [`MAX_RETRIES_LIMIT`]
    /// - an extra watch directory is relative
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer_size == 0 {
            return Err(ConfigError::invalid_option(
                "event_buffer_size",
                "must be at least 1",
            ));
        }
        if self.debounce_ms >= self.dedup_window_ms {
            return Err(ConfigError::invalid_option(
                "debounce_ms",
                format!(
                    "must be shorter than dedup_window_ms ({} >= {})",
                    self.debounce_ms, self.dedup_window_ms
                ),
            ));
        }
        if self.dedup_window_ms > self.cleanup_horizon_ms {
            return Err(ConfigError::invalid_option(
                "dedup_window_ms",
                format!(
                    "must not exceed cleanup_horizon_ms ({} > {})",
                    self.dedup_window_ms, self.cleanup_horizon_ms
                ),
            ));
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::invalid_option(
                "retry.max_retries",
                format!("must be at most {MAX_RETRIES_LIMIT}"),
            ));
        }
        if let Some(dir) = self.extra_watch_dirs.iter().find(|d| d.is_relative()) {
            return Err(ConfigError::invalid_option(
                "extra_watch_dirs",
                format!("'{dir}' is not an absolute path"),
            ));
        }
        Ok(())
    }

    /// Resolves the directories to watch for `shape`: the shape's defaults
    /// (when enabled) followed by the extra directories, without duplicates.
    #[must_use]
    pub fn watch_dirs<S: LaunchableShape + ?Sized>(&self, shape: &S) -> Vec<Utf8PathBuf> {
        let defaults = if self.include_default_dirs {
            shape.default_watch_dirs()
        } else {
            Vec::new()
        };
        let mut seen = path_key_set_with_capacity(defaults.len() + self.extra_watch_dirs.len());
        defaults
            .into_iter()
            .chain(self.extra_watch_dirs.iter().cloned())
            .filter(|dir| seen.insert(PathKey::new(dir)))
            .collect()
    }
}

/// Configuration for the staleness refresher.
///
/// # Examples
///
/// ```
/// use lc_core::RefreshConfig;
///
/// let config = RefreshConfig::default();
/// assert_eq!(config.interval_secs, 900);
/// assert_eq!(config.stale_after_secs, 3600);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Whether the background refresher runs.
    pub enabled: bool,
    /// Delay before the first refresh pass, in seconds.
    pub initial_delay_secs: u64,
    /// Period between refresh passes, in seconds.
    pub interval_secs: u64,
    /// Entries not verified against disk for this long are stale.
    pub stale_after_secs: u64,
    /// Period between discovery passes looking for unseen items, in seconds.
    pub discover_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_secs: 30,
            interval_secs: 900,
            stale_after_secs: 3600,
            discover_interval_secs: 21_600,
        }
    }
}

impl RefreshConfig {
    /// Delay before the first pass.
    #[inline]
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Period between passes.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Staleness threshold.
    #[inline]
    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Period between discovery passes.
    #[inline]
    #[must_use]
    pub const fn discover_interval(&self) -> Duration {
        Duration::from_secs(self.discover_interval_secs)
    }

    /// Checks every option.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when a period is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::invalid_option("interval_secs", "must be at least 1"));
        }
        if self.discover_interval_secs == 0 {
            return Err(ConfigError::invalid_option(
                "discover_interval_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Root configuration for launchcat.
///
/// # Examples
///
/// ```
/// use lc_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"watcher": {"debounce_ms": 250}}"#).unwrap();
/// assert_eq!(config.watcher.debounce_ms, 250);
/// assert_eq!(config.watcher.event_buffer_size, 100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem watch configuration.
    pub watcher: WatcherConfig,

    /// Background refresh configuration.
    pub refresh: RefreshConfig,

    /// Location of the catalog database. `None` selects
    /// [`default_catalog_path`].
    pub catalog_path: Option<Utf8PathBuf>,
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` does not exist, a read or
    /// parse error, or the first validation failure.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watcher.validate()?;
        self.refresh.validate()
    }

    /// Resolves the catalog database location.
    #[must_use]
    pub fn catalog_path(&self) -> Option<Utf8PathBuf> {
        self.catalog_path.clone().or_else(default_catalog_path)
    }
}

/// Default location of the catalog database inside the per-user data
/// directory, e.g. `~/.local/share/launchcat/catalog.db`.
#[must_use]
pub fn default_catalog_path() -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "launchcat")?;
    let data = Utf8PathBuf::from_path_buf(dirs.data_dir().to_path_buf()).ok()?;
    Some(data.join("catalog.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::BundleShape;

    #[test]
    fn test_watcher_config_defaults() {
        insta::assert_json_snapshot!(WatcherConfig::default(), @r#"
        {
          "enabled": true,
          "include_default_dirs": true,
          "extra_watch_dirs": [],
          "debounce_ms": 500,
          "event_buffer_size": 100,
          "process_delay": {
            "added_ms": 500,
            "modified_ms": 300
          },
          "retry": {
            "max_retries": 3,
            "retry_interval_ms": 1000,
            "exponential_backoff": true
          },
          "dedup_window_ms": 5000,
          "cleanup_horizon_ms": 300000
        }
        "#);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = WatcherConfig {
            event_buffer_size: 0,
            ..WatcherConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.option(), Some("event_buffer_size"));
    }

    #[test]
    fn test_debounce_must_be_shorter_than_dedup_window() {
        let config = WatcherConfig {
            debounce_ms: 5_000,
            ..WatcherConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().option(), Some("debounce_ms"));
    }

    #[test]
    fn test_dedup_window_must_fit_cleanup_horizon() {
        let config = WatcherConfig {
            dedup_window_ms: 600_000,
            ..WatcherConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().option(), Some("dedup_window_ms"));
    }

    #[test]
    fn test_retry_limit() {
        let mut config = WatcherConfig::default();
        config.retry.max_retries = MAX_RETRIES_LIMIT + 1;
        assert_eq!(config.validate().unwrap_err().option(), Some("retry.max_retries"));
    }

    #[test]
    fn test_relative_extra_dir_rejected() {
        let config = WatcherConfig {
            extra_watch_dirs: vec![Utf8PathBuf::from("relative/apps")],
            ..WatcherConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().option(), Some("extra_watch_dirs"));
    }

    #[test]
    fn test_negative_values_rejected_at_parse() {
        let parsed: Result<WatcherConfig, _> = serde_json::from_str(r#"{"debounce_ms": -1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_watch_dirs_dedup_and_order() {
        let config = WatcherConfig {
            include_default_dirs: false,
            extra_watch_dirs: vec![
                Utf8PathBuf::from("/opt/apps"),
                Utf8PathBuf::from("/opt/apps/"),
                Utf8PathBuf::from("/srv/apps"),
            ],
            ..WatcherConfig::default()
        };
        let dirs = config.watch_dirs(&BundleShape::default());
        assert_eq!(dirs, vec![Utf8PathBuf::from("/opt/apps"), Utf8PathBuf::from("/srv/apps")]);
    }

    #[test]
    fn test_watch_dirs_include_defaults_first() {
        let config = WatcherConfig {
            extra_watch_dirs: vec![Utf8PathBuf::from("/opt/apps")],
            ..WatcherConfig::default()
        };
        let dirs = config.watch_dirs(&BundleShape::default());
        assert_eq!(dirs.first().map(|p| p.as_str()), Some("/Applications"));
        assert_eq!(dirs.last().map(|p| p.as_str()), Some("/opt/apps"));
    }

    #[test]
    fn test_refresh_zero_interval_rejected() {
        let config = RefreshConfig {
            interval_secs: 0,
            ..RefreshConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().option(), Some("interval_secs"));
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"refresh": {"stale_after_secs": 60}, "catalog_path": "/tmp/c.db"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.refresh.stale_after_secs, 60);
        assert_eq!(config.refresh.interval_secs, 900);
        assert_eq!(config.watcher, WatcherConfig::default());
        assert_eq!(config.catalog_path(), Some(Utf8PathBuf::from("/tmp/c.db")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Utf8Path::new("/no/such/launchcat.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let file = dir.path().join("config.json");
        std::fs::write(&file, r#"{"watcher": {"event_buffer_size": 0}}"#).unwrap();
        let path = Utf8Path::from_path(&file).expect("utf-8 path");

        let err = Config::load(path).unwrap_err();
        assert_eq!(err.option(), Some("event_buffer_size"));
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let file = dir.path().join("config.json");
        std::fs::write(&file, r#"{"watcher": {"enabled": false}}"#).unwrap();
        let path = Utf8Path::from_path(&file).expect("utf-8 path");

        let config = Config::load(path).unwrap();
        assert!(!config.watcher.enabled);
    }
}
