//! End-to-end scenarios: injected change events through the whole engine
//! into a real SQLite catalog.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use lc_catalog::{CatalogStore, SqliteCatalog};
use lc_core::{Config, ProcessDelayConfig, RetryConfig};
use lc_scanner::FakeScanner;
use lc_sync::Coordinator;
use lc_watcher::{ChangeEvent, ManualSource};

type Engine = Coordinator<ManualSource, SqliteCatalog, Arc<FakeScanner>>;

fn config() -> Config {
    let mut config = Config::default();
    config.watcher.include_default_dirs = false;
    config.watcher.debounce_ms = 5;
    config.watcher.dedup_window_ms = 20;
    config.watcher.cleanup_horizon_ms = 1_000;
    config.watcher.process_delay = ProcessDelayConfig {
        added_ms: 0,
        modified_ms: 0,
    };
    config.watcher.retry = RetryConfig {
        max_retries: 1,
        retry_interval_ms: 1,
        exponential_backoff: false,
    };
    config.refresh.enabled = false;
    config
}

/// An engine over an initially empty scanner, so startup population
/// catalogs nothing and only events can.
fn engine() -> (Engine, Arc<FakeScanner>) {
    let scanner = Arc::new(FakeScanner::new());
    let engine = Coordinator::new(
        &config(),
        ManualSource::new(16),
        SqliteCatalog::open_in_memory().expect("in-memory catalog"),
        Arc::clone(&scanner),
    )
    .expect("valid engine");
    (engine, scanner)
}

async fn wait_until(engine: &Engine, done: impl Fn(&Engine) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(engine) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_added_creates_one_entry_and_removed_empties() {
    let (engine, scanner) = engine();
    engine.start().await.unwrap();
    assert!(engine.store().is_empty().unwrap());
    let mut changes = engine.subscribe();

    let path = Utf8Path::new("/Apps/Foo.bundle");
    scanner.insert(path);
    engine.manager().source().emit(ChangeEvent::added(path));
    wait_until(&engine, |e| e.store().len().unwrap() == 1).await;

    let entries = engine.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Foo");
    assert!(changes.try_recv().is_ok());

    // Past the dedup window, the removal is processed.
    tokio::time::sleep(Duration::from_millis(30)).await;
    scanner.remove(path);
    engine.manager().source().emit(ChangeEvent::removed(path));
    wait_until(&engine, |e| e.store().is_empty().unwrap()).await;

    let metrics = engine.status().metrics;
    assert_eq!(metrics.added, 1);
    assert_eq!(metrics.removed, 1);
    assert_eq!(metrics.events_processed, 2);
    assert_eq!(metrics.errors, 0);
    engine.stop().await;
}

#[tokio::test]
async fn test_modified_then_vanished_removes_without_error() {
    let (engine, scanner) = engine();
    engine.start().await.unwrap();

    let path = Utf8Path::new("/Apps/Bar.bundle");
    scanner.insert(path);
    engine.manager().source().emit(ChangeEvent::added(path));
    wait_until(&engine, |e| e.store().len().unwrap() == 1).await;
    let id = engine.entries().unwrap()[0].id.clone();
    engine.record_launch(&id).unwrap();

    // Renamed in place: same path, same id, new name.
    tokio::time::sleep(Duration::from_millis(30)).await;
    scanner.insert_named(path, "Bar Pro");
    engine.manager().source().emit(ChangeEvent::modified(path));
    wait_until(&engine, |e| e.entries().unwrap()[0].name == "Bar Pro").await;
    let entry = engine.entries().unwrap().remove(0);
    assert_eq!(entry.id, id);
    assert_eq!(entry.usage.use_count, 1);

    // Gone by the time it is parsed again.
    tokio::time::sleep(Duration::from_millis(30)).await;
    scanner.remove(path);
    engine.manager().source().emit(ChangeEvent::modified(path));
    wait_until(&engine, |e| e.store().is_empty().unwrap()).await;

    assert_eq!(engine.status().metrics.errors, 0);
    engine.stop().await;
}

#[tokio::test]
async fn test_unknown_item_is_reported_not_cataloged() {
    let (engine, scanner) = engine();
    engine.start().await.unwrap();

    engine
        .manager()
        .source()
        .emit(ChangeEvent::added("/Apps/Ghost.bundle"));
    wait_until(&engine, |e| e.status().metrics.errors == 1).await;

    // Item disappeared before it could be parsed; nothing to retry.
    assert_eq!(scanner.parse_calls(), 1);
    assert!(engine.store().is_empty().unwrap());
    engine.stop().await;
}

#[tokio::test]
async fn test_stop_leaves_no_running_tasks() {
    let (engine, _scanner) = engine();
    engine.start().await.unwrap();
    assert!(engine.status().running);

    engine.stop().await;
    assert!(!engine.status().running);
    assert!(!engine.manager().source().emit(ChangeEvent::added("/Apps/Late.bundle")));
}
