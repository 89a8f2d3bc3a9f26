//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ContentStore trait.

use crate::crawler::FetchMethod;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ContentStore, StorageError, StorageResult};
use crate::storage::{CachedPage, RunRecord, RunStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite content store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates a store at the given database path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Formats a timestamp so it parses back to the identical instant
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(url: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptEntry {
            url: url.to_string(),
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}

impl ContentStore for SqliteStore {
    // ===== Cached Pages =====

    fn get(&self, url: &str) -> StorageResult<Option<CachedPage>> {
        let row = self
            .conn
            .query_row(
                "SELECT url, body, mime, fetched_at, strategy FROM pages WHERE url = ?1",
                params![url],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((url, body, mime, fetched_at, strategy)) = row else {
            return Ok(None);
        };

        let fetched_at = decode_timestamp(&url, &fetched_at)?;
        let strategy_used =
            FetchMethod::from_db_string(&strategy).ok_or_else(|| StorageError::CorruptEntry {
                url: url.clone(),
                reason: format!("unknown fetch method '{}'", strategy),
            })?;

        Ok(Some(CachedPage {
            url,
            body,
            mime,
            fetched_at,
            strategy_used,
        }))
    }

    fn put(&mut self, page: &CachedPage) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pages (url, body, mime, fetched_at, strategy)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                page.url,
                page.body,
                page.mime,
                encode_timestamp(&page.fetched_at),
                page.strategy_used.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<u64> {
        let removed = self.conn.execute("DELETE FROM pages", [])?;
        Ok(removed as u64)
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_method(&self, method: FetchMethod) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE strategy = ?1",
            params![method.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::Database(format!("Run {} not found", run_id)));
        }
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str, method: FetchMethod) -> CachedPage {
        CachedPage::new(url, body, "text/html", method)
    }

    #[test]
    fn test_put_then_get_returns_identical_page() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let original = page("https://example.com/a", "<p>hi</p>", FetchMethod::Light);

        store.put(&original).unwrap();
        let loaded = store.get("https://example.com/a").unwrap();

        assert_eq!(loaded, Some(original));
    }

    #[test]
    fn test_get_missing() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(store.get("https://example.com/none").unwrap().is_none());
    }

    #[test]
    fn test_put_supersedes_previous_entry() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store
            .put(&page("https://example.com/", "old", FetchMethod::Light))
            .unwrap();
        store
            .put(&page("https://example.com/", "new", FetchMethod::Rendered))
            .unwrap();

        let loaded = store.get("https://example.com/").unwrap().unwrap();
        assert_eq!(loaded.body, "new");
        assert_eq!(loaded.strategy_used, FetchMethod::Rendered);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_clear_and_counts() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store
            .put(&page("https://example.com/1", "a", FetchMethod::Light))
            .unwrap();
        store
            .put(&page("https://example.com/2", "b", FetchMethod::Light))
            .unwrap();
        store
            .put(&page("https://example.com/3", "c", FetchMethod::Rendered))
            .unwrap();

        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.count_by_method(FetchMethod::Light).unwrap(), 2);
        assert_eq!(store.count_by_method(FetchMethod::Rendered).unwrap(), 1);

        assert_eq!(store.clear().unwrap(), 3);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        let first = store.create_run("hash-1").unwrap();
        let second = store.create_run("hash-2").unwrap();
        store.finish_run(first, RunStatus::Completed).unwrap();

        let runs = store.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[0].status, RunStatus::Running);
        assert_eq!(runs[1].status, RunStatus::Completed);
        assert!(runs[1].finished_at.is_some());
        assert_eq!(runs[1].config_hash, "hash-1");
    }

    #[test]
    fn test_finish_unknown_run() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        assert!(store.finish_run(42, RunStatus::Aborted).is_err());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite3");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .put(&page("https://example.com/", "kept", FetchMethod::Light))
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("https://example.com/").unwrap().unwrap().body, "kept");
    }
}
