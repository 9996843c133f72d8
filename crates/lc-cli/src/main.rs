//! Command-line front end for the launchcat catalog engine.
//!
//! # Usage
//!
//! ```bash
//! launchcat [OPTIONS] <COMMAND>
//!
//! # Keep the catalog in sync until interrupted
//! launchcat watch
//!
//! # Print the catalog
//! launchcat list --json
//!
//! # One reconciliation pass over stale entries plus discovery
//! launchcat refresh
//!
//! # Watch state and effective configuration
//! launchcat status
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use lc_catalog::{CatalogStore, SqliteCatalog};
use lc_core::{CatalogEntry, Config, EntryId, PlatformShape};
use lc_scanner::FsScanner;
use lc_sync::{Coordinator, RefreshReport};
use lc_watcher::FsWatcher;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type Engine = Coordinator<FsWatcher<PlatformShape>, SqliteCatalog, FsScanner<PlatformShape>>;

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Keeps a catalog of launchable applications in sync with the disk.
#[derive(Parser)]
#[command(name = "launchcat", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    ///
    /// Built-in defaults are used when not specified.
    #[arg(short, long, global = true, env = "LAUNCHCAT_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Catalog database location (overrides the configuration file).
    #[arg(long, global = true, env = "LAUNCHCAT_DB")]
    db: Option<Utf8PathBuf>,

    /// Additional directory to watch and scan. May be repeated.
    #[arg(short = 'w', long = "watch-dir", global = true)]
    watch_dirs: Vec<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch for changes and keep the catalog in sync until interrupted.
    Watch {
        /// Disable file watching and rely on periodic refresh only.
        #[arg(long)]
        no_watch: bool,
    },

    /// Print every catalog entry.
    List {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Re-verify stale entries and discover new items once.
    Refresh,

    /// Print watch state and effective configuration as JSON.
    Status,

    /// Record a launch of the entry with the given id.
    Launch {
        /// Entry identifier as printed by `list`.
        id: String,
    },
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// `notify` and `rusqlite` internals are filtered to `warn`.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn,rusqlite=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the configuration file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(db) = &cli.db {
        config.catalog_path = Some(db.clone());
    }
    for dir in &cli.watch_dirs {
        if !dir.is_dir() {
            return Err(eyre!("Watch directory is not a directory: {dir}"));
        }
        if !config.watcher.extra_watch_dirs.contains(dir) {
            config.watcher.extra_watch_dirs.push(dir.clone());
        }
    }

    config.validate()?;
    Ok(config)
}

/// Wires the platform watcher, scanner and catalog into an engine.
///
/// The scanner walks the same directories the watcher observes.
///
/// # Errors
///
/// Returns an error if no catalog location can be determined or the
/// database cannot be opened.
fn create_engine(config: &Config) -> color_eyre::Result<Engine> {
    let catalog_path = config
        .catalog_path()
        .ok_or_else(|| eyre!("No catalog location available; pass --db"))?;
    let store = SqliteCatalog::open(&catalog_path)
        .map_err(|e| eyre!("Failed to open catalog at {catalog_path}: {e}"))?;

    let shape = PlatformShape::default();
    let roots = config.watcher.watch_dirs(&shape);
    info!(catalog = %catalog_path, roots = roots.len(), "Opening catalog");

    let watcher = FsWatcher::new(PlatformShape::default(), roots.clone(), &config.watcher)?;
    let scanner = FsScanner::new(shape, roots);

    Ok(Coordinator::new(config, watcher, store, scanner)?)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs the engine until Ctrl-C (or SIGTERM on Unix).
///
/// # Errors
///
/// Returns an error if the engine fails to start.
async fn run_watch(mut config: Config, no_watch: bool) -> color_eyre::Result<()> {
    if no_watch {
        config.watcher.enabled = false;
    }
    let engine = create_engine(&config)?;
    engine.start().await?;

    let status = engine.status();
    info!(
        running = status.running,
        dirs = status.watch_dirs.len(),
        entries = engine.store().len()?,
        "Catalog engine started"
    );

    let mut changes = engine.subscribe();
    let log_changes = async {
        loop {
            match changes.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
            match engine.store().len() {
                Ok(count) => info!(entries = count, "Catalog changed"),
                Err(err) => tracing::warn!(error = %err, "Catalog changed but could not be read"),
            }
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            () = log_changes => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl-C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            () = log_changes => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl-C, shutting down");
            }
        }
    }

    engine.stop().await;
    let metrics = engine.status().metrics;
    info!(
        processed = metrics.events_processed,
        dropped = metrics.events_dropped,
        errors = metrics.errors,
        "Watch session finished"
    );
    Ok(())
}

/// Prints the catalog.
///
/// # Errors
///
/// Returns an error if the catalog cannot be read or output fails.
fn run_list(config: &Config, json: bool) -> color_eyre::Result<()> {
    let engine = create_engine(config)?;
    let entries = engine.entries()?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut handle, &entries)
            .map_err(|e| eyre!("Failed to serialize JSON: {e}"))?;
        writeln!(handle)?;
    } else {
        print_entries(&mut handle, &entries)?;
    }
    Ok(())
}

/// Runs one stale pass and discovery, then prints a summary.
///
/// # Errors
///
/// Returns an error if the pass fails.
async fn run_refresh(config: &Config) -> color_eyre::Result<()> {
    let engine = create_engine(config)?;
    let report = engine.refresh_now().await?;
    print_refresh_summary(&report);
    Ok(())
}

/// Prints the watch status as JSON.
///
/// # Errors
///
/// Returns an error if serialization or output fails.
fn run_status(config: &Config) -> color_eyre::Result<()> {
    #[derive(serde::Serialize)]
    struct Status {
        catalog_path: Option<Utf8PathBuf>,
        entries: usize,
        #[serde(flatten)]
        watch: lc_sync::WatchStatus,
    }

    let engine = create_engine(config)?;
    let status = Status {
        catalog_path: config.catalog_path(),
        entries: engine.store().len()?,
        watch: engine.status(),
    };

    let content = serde_json::to_string_pretty(&status)
        .map_err(|e| eyre!("Failed to serialize JSON: {e}"))?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{content}")?;
    Ok(())
}

/// Records a launch and prints the updated counters.
///
/// # Errors
///
/// Returns an error if the entry does not exist.
fn run_launch(config: &Config, id: &str) -> color_eyre::Result<()> {
    let engine = create_engine(config)?;
    let usage = engine.record_launch(&EntryId::from(id))?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{id}: launched {} time(s)", usage.use_count)?;
    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Writes one line per entry, most used first.
fn print_entries(out: &mut impl Write, entries: &[CatalogEntry]) -> std::io::Result<()> {
    let mut sorted: Vec<&CatalogEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.usage
            .use_count
            .cmp(&a.usage.use_count)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    for entry in sorted {
        writeln!(
            out,
            "{:<36}  {:>5}  {:<32}  {}",
            entry.id, entry.usage.use_count, entry.name, entry.path
        )?;
    }
    writeln!(out)?;
    writeln!(out, "{} entries", entries.len())
}

/// Prints a summary of a refresh pass.
fn print_refresh_summary(report: &RefreshReport) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    let _ = writeln!(handle);
    let _ = writeln!(handle, "Catalog Refresh Summary");
    let _ = writeln!(handle, "=======================");
    let _ = writeln!(handle);
    let _ = writeln!(handle, "Entries checked:  {}", report.checked);
    let _ = writeln!(handle, "  Unchanged:      {}", report.unchanged);
    let _ = writeln!(handle, "  Updated:        {}", report.updated);
    let _ = writeln!(handle, "  Removed:        {}", report.removed);
    let _ = writeln!(handle, "Discovered:       {}", report.added);
    if !report.changed() {
        let _ = writeln!(handle);
        let _ = writeln!(handle, "Catalog already up to date.");
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    let config = build_config(&cli)?;
    match &cli.command {
        Commands::Watch { no_watch } => run_watch(config, *no_watch).await,
        Commands::List { json } => run_list(&config, *json),
        Commands::Refresh => run_refresh(&config).await,
        Commands::Status => run_status(&config),
        Commands::Launch { id } => run_launch(&config, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn entry(name: &str, path: &str, uses: u64) -> CatalogEntry {
        let mut entry = CatalogEntry::new(EntryId::generate(), name, path, DateTime::UNIX_EPOCH);
        entry.usage.use_count = uses;
        entry
    }

    #[test]
    fn test_cli_parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "launchcat", "list", "--json", "--db", "/tmp/c.db", "-w", "/opt/apps",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::List { json: true }));
        assert_eq!(cli.db.as_deref().map(camino::Utf8Path::as_str), Some("/tmp/c.db"));
        assert_eq!(cli.watch_dirs, vec![Utf8PathBuf::from("/opt/apps")]);
    }

    #[test]
    fn test_build_config_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let apps = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let cli = Cli::try_parse_from([
            "launchcat",
            "status",
            "--db",
            "/tmp/c.db",
            "--watch-dir",
            apps.as_str(),
        ])
        .unwrap();

        let config = build_config(&cli).unwrap();
        assert_eq!(config.catalog_path(), Some(Utf8PathBuf::from("/tmp/c.db")));
        assert_eq!(config.watcher.extra_watch_dirs, vec![apps]);
    }

    #[test]
    fn test_build_config_rejects_missing_watch_dir() {
        let cli =
            Cli::try_parse_from(["launchcat", "status", "-w", "/definitely/not/here"]).unwrap();
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_print_entries_orders_by_use_count() {
        let entries = vec![
            entry("Zed", "/Apps/Zed.bundle", 0),
            entry("Alpha", "/Apps/Alpha.bundle", 0),
            entry("Busy", "/Apps/Busy.bundle", 7),
        ];
        let mut out = Vec::new();
        print_entries(&mut out, &entries).unwrap();
        let text = String::from_utf8(out).unwrap();

        let names: Vec<&str> = text
            .lines()
            .filter_map(|line| line.split_whitespace().nth(2))
            .collect();
        assert_eq!(names, vec!["Busy", "Alpha", "Zed"]);
        assert!(text.ends_with("3 entries\n"));
    }
}
