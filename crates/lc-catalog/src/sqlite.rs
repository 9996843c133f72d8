//! SQLite-backed catalog store with WAL.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use lc_core::{CatalogEntry, EntryId, PathKey, UsageStats};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::CatalogError;
use crate::store::CatalogStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS catalog_entries (
        id TEXT PRIMARY KEY,
        path_key TEXT NOT NULL UNIQUE,
        path TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        icon_path TEXT,
        dir_updated_at INTEGER NOT NULL,
        verified_at INTEGER NOT NULL,
        last_used_at INTEGER,
        use_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_catalog_verified
        ON catalog_entries (verified_at);";

const SELECT_COLUMNS: &str = "SELECT id, path, name, description, icon_path, dir_updated_at,
            last_used_at, use_count
     FROM catalog_entries";

/// SQLite catalog store.
///
/// A single connection is shared behind a mutex; every batch runs in its own
/// transaction.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog").finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Opens or creates a catalog database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Utf8Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = %path, "opened catalog database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns entries last verified at or before `cutoff`.
    pub fn find_verified_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE verified_at <= ?1 ORDER BY verified_at ASC"
        ))?;
        let rows = stmt.query_map(params![cutoff.timestamp_millis()], read_row)?;
        collect_rows(rows)
    }
}

impl CatalogStore for SqliteCatalog {
    fn list(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY name COLLATE NOCASE"))?;
        let rows = stmt.query_map([], read_row)?;
        collect_rows(rows)
    }

    fn find_by_path(&self, path: &Utf8Path) -> Result<Option<CatalogEntry>, CatalogError> {
        let key = PathKey::new(path);
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE path_key = ?1"),
                params![key.as_str()],
                read_row,
            )
            .optional()?;
        row.map(decode).transpose()
    }

    fn find_stale(&self, threshold: Duration) -> Result<Vec<CatalogEntry>, CatalogError> {
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::TimeDelta::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(threshold)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.find_verified_before(cutoff)
    }

    fn upsert_batch(&self, entries: &[CatalogEntry]) -> Result<usize, CatalogError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().timestamp_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO catalog_entries
                    (id, path_key, path, name, description, icon_path, dir_updated_at,
                     verified_at, last_used_at, use_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(path_key) DO UPDATE SET
                    path = excluded.path,
                    name = excluded.name,
                    description = excluded.description,
                    icon_path = excluded.icon_path,
                    dir_updated_at = excluded.dir_updated_at,
                    verified_at = excluded.verified_at
                 ON CONFLICT(id) DO UPDATE SET
                    path_key = excluded.path_key,
                    path = excluded.path,
                    name = excluded.name,
                    description = excluded.description,
                    icon_path = excluded.icon_path,
                    dir_updated_at = excluded.dir_updated_at,
                    verified_at = excluded.verified_at",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id.as_str(),
                    entry.path_key().as_str(),
                    entry.path.as_str(),
                    entry.name,
                    entry.description,
                    entry.icon_path.as_deref().map(Utf8Path::as_str),
                    entry.dir_updated_at.timestamp_millis(),
                    now,
                    entry.usage.last_used_at.map(|at| at.timestamp_millis()),
                    i64::try_from(entry.usage.use_count).unwrap_or(i64::MAX),
                ])?;
            }
        }
        // Dropping an uncommitted transaction rolls it back, so any `?` above
        // leaves the table untouched.
        tx.commit()?;

        tracing::debug!(count = entries.len(), "upserted catalog entries");
        Ok(entries.len())
    }

    fn update_batch(&self, entries: &[CatalogEntry]) -> Result<usize, CatalogError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().timestamp_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE catalog_entries SET
                    path_key = ?2,
                    path = ?3,
                    name = ?4,
                    description = ?5,
                    icon_path = ?6,
                    dir_updated_at = ?7,
                    verified_at = ?8
                 WHERE id = ?1",
            )?;
            for entry in entries {
                updated += stmt.execute(params![
                    entry.id.as_str(),
                    entry.path_key().as_str(),
                    entry.path.as_str(),
                    entry.name,
                    entry.description,
                    entry.icon_path.as_deref().map(Utf8Path::as_str),
                    entry.dir_updated_at.timestamp_millis(),
                    now,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = updated, "updated catalog entries");
        Ok(updated)
    }

    fn delete_batch(&self, ids: &[EntryId]) -> Result<usize, CatalogError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM catalog_entries WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id.as_str()])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = deleted, "deleted catalog entries");
        Ok(deleted)
    }

    fn touch_batch(&self, ids: &[EntryId]) -> Result<usize, CatalogError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().timestamp_millis();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut touched = 0;
        {
            let mut stmt = tx.prepare("UPDATE catalog_entries SET verified_at = ?1 WHERE id = ?2")?;
            for id in ids {
                touched += stmt.execute(params![now, id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(touched)
    }

    fn record_launch(&self, id: &EntryId, at: DateTime<Utc>) -> Result<UsageStats, CatalogError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE catalog_entries
             SET use_count = use_count + 1, last_used_at = ?1
             WHERE id = ?2",
            params![at.timestamp_millis(), id.as_str()],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(id.clone()));
        }
        let (last_used_at, use_count): (Option<i64>, i64) = conn.query_row(
            "SELECT last_used_at, use_count FROM catalog_entries WHERE id = ?1",
            params![id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(UsageStats {
            last_used_at: last_used_at.and_then(DateTime::from_timestamp_millis),
            use_count: u64::try_from(use_count).unwrap_or(0),
        })
    }

    fn len(&self) -> Result<usize, CatalogError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM catalog_entries", [], |row| {
            row.get(0)
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Raw column values of one row, decoded into an entry by [`decode`].
struct RawRow {
    id: String,
    path: String,
    name: String,
    description: Option<String>,
    icon_path: Option<String>,
    dir_updated_at: i64,
    last_used_at: Option<i64>,
    use_count: i64,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        icon_path: row.get(4)?,
        dir_updated_at: row.get(5)?,
        last_used_at: row.get(6)?,
        use_count: row.get(7)?,
    })
}

fn decode(raw: RawRow) -> Result<CatalogEntry, CatalogError> {
    let Some(dir_updated_at) = DateTime::from_timestamp_millis(raw.dir_updated_at) else {
        return Err(CatalogError::Corrupt {
            id: raw.id,
            reason: format!("dir_updated_at out of range: {}", raw.dir_updated_at),
        });
    };
    let mut entry = CatalogEntry::new(
        EntryId::from(raw.id),
        raw.name,
        Utf8PathBuf::from(raw.path),
        dir_updated_at,
    );
    entry.description = raw.description;
    entry.icon_path = raw.icon_path.map(Utf8PathBuf::from);
    entry.usage = UsageStats {
        last_used_at: raw.last_used_at.and_then(DateTime::from_timestamp_millis),
        use_count: u64::try_from(raw.use_count).unwrap_or(0),
    };
    Ok(entry)
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    rows.map(|row| decode(row?)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(name: &str, path: &str) -> CatalogEntry {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        CatalogEntry::new(EntryId::generate(), name, path, at)
    }

    #[test]
    fn test_upsert_and_find_by_path() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let foo = entry("Foo", "/Apps/Foo.app").with_icon("/icons/foo.png");
        assert_eq!(store.upsert_batch(std::slice::from_ref(&foo)).unwrap(), 1);

        let found = store.find_by_path(Utf8Path::new("/Apps/Foo.app/")).unwrap();
        assert_eq!(found, Some(foo));
        assert!(store.find_by_path(Utf8Path::new("/Apps/Bar.app")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_updates_in_place_and_keeps_usage() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let foo = entry("Foo", "/Apps/Foo.app");
        store.upsert_batch(std::slice::from_ref(&foo)).unwrap();
        store.record_launch(&foo.id, Utc::now()).unwrap();

        // A stale copy with zero usage must not reset the counter.
        let renamed = CatalogEntry {
            name: "Foo Pro".to_owned(),
            ..foo.clone()
        };
        store.upsert_batch(&[renamed]).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, foo.id);
        assert_eq!(all[0].name, "Foo Pro");
        assert_eq!(all[0].usage.use_count, 1);
    }

    #[test]
    fn test_upsert_batch_is_atomic() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let existing = entry("Existing", "/Apps/C.app");
        store.upsert_batch(std::slice::from_ref(&existing)).unwrap();

        // The third write of the batch is refused by the database.
        store
            .conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_c BEFORE INSERT ON catalog_entries
                 WHEN NEW.name = 'C updated'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let batch = vec![
            entry("A", "/Apps/A.app"),
            entry("B", "/Apps/B.app"),
            entry("C updated", "/Apps/C.app"),
            entry("D", "/Apps/D.app"),
            entry("E", "/Apps/E.app"),
        ];
        assert!(store.upsert_batch(&batch).is_err());

        let all = store.list().unwrap();
        assert_eq!(all, vec![existing]);
    }

    #[test]
    fn test_upsert_same_path_new_id_keeps_stored_row() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let stored = entry("Foo", "/Apps/Foo.app");
        store.upsert_batch(std::slice::from_ref(&stored)).unwrap();
        store.record_launch(&stored.id, Utc::now()).unwrap();

        // Parsed again elsewhere: fresh id, same item.
        let reparsed = entry("Foo Pro", "/Apps/Foo.app/");
        assert_ne!(reparsed.id, stored.id);
        let batch = vec![entry("Bar", "/Apps/Bar.app"), reparsed];
        assert_eq!(store.upsert_batch(&batch).unwrap(), 2);

        assert_eq!(store.len().unwrap(), 2);
        let foo = store
            .find_by_path(Utf8Path::new("/Apps/Foo.app"))
            .unwrap()
            .unwrap();
        assert_eq!(foo.id, stored.id);
        assert_eq!(foo.name, "Foo Pro");
        assert_eq!(foo.usage.use_count, 1);
    }

    #[test]
    fn test_update_batch_never_resurrects() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let a = entry("A", "/Apps/A.app");
        let b = entry("B", "/Apps/B.app");
        store.upsert_batch(&[a.clone(), b.clone()]).unwrap();
        store.record_launch(&a.id, Utc::now()).unwrap();
        store.delete_batch(std::slice::from_ref(&b.id)).unwrap();

        let updates = vec![
            CatalogEntry {
                name: "A renamed".to_owned(),
                ..a.clone().with_icon("/icons/a.png")
            },
            CatalogEntry {
                name: "B renamed".to_owned(),
                ..b
            },
        ];
        assert_eq!(store.update_batch(&updates).unwrap(), 1);

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, a.id);
        assert_eq!(all[0].name, "A renamed");
        assert_eq!(all[0].icon_path.as_deref(), Some(Utf8Path::new("/icons/a.png")));
        assert_eq!(all[0].usage.use_count, 1);
    }

    #[test]
    fn test_delete_batch() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let a = entry("A", "/Apps/A.app");
        let b = entry("B", "/Apps/B.app");
        store.upsert_batch(&[a.clone(), b.clone()]).unwrap();

        let deleted = store
            .delete_batch(&[a.id.clone(), EntryId::from("unknown")])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.list().unwrap(), vec![b]);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_find_stale() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.upsert_batch(&[entry("A", "/Apps/A.app")]).unwrap();

        assert_eq!(store.find_stale(Duration::ZERO).unwrap().len(), 1);
        assert!(store.find_stale(Duration::from_secs(3600)).unwrap().is_empty());

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(store.find_verified_before(past).unwrap().is_empty());
    }

    #[test]
    fn test_touch_batch_marks_verified() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let a = entry("A", "/Apps/A.app");
        store.upsert_batch(std::slice::from_ref(&a)).unwrap();

        assert_eq!(store.touch_batch(std::slice::from_ref(&a.id)).unwrap(), 1);
        assert!(store.find_stale(Duration::from_secs(60)).unwrap().is_empty());
    }

    #[test]
    fn test_record_launch_unknown_id() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let err = store
            .record_launch(&EntryId::from("missing"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nested/catalog.db")).unwrap();
        let a = entry("A", "/Apps/A.app");

        {
            let store = SqliteCatalog::open(&path).unwrap();
            store.upsert_batch(std::slice::from_ref(&a)).unwrap();
        }

        let store = SqliteCatalog::open(&path).unwrap();
        assert_eq!(store.list().unwrap(), vec![a]);
        assert!(!store.is_empty().unwrap());
    }
}
