//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{DocumentRecord, FailureRecord, RunRecord, RunStatus};
use crate::url::LinkCategory;
use crate::ScribeError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

const RUN_COLUMNS: &str = "id, start_url, started_at, finished_at, config_hash, status, \
                           pages_downloaded, assets_downloaded";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ScribeError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ScribeError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, ScribeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            start_url: row.get(1)?,
            started_at: row.get(2)?,
            finished_at: row.get(3)?,
            config_hash: row.get(4)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                .unwrap_or(RunStatus::Failed),
            pages_downloaded: row.get::<_, i64>(6)? as u64,
            assets_downloaded: row.get::<_, i64>(7)? as u64,
        })
    }

    fn count(&self, sql: &str, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params![run_id], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, start_url: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (start_url, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![start_url, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                Self::run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                Self::run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_downloaded: u64,
        assets_downloaded: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_downloaded = ?3, \
             assets_downloaded = ?4 WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                pages_downloaded as i64,
                assets_downloaded as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Documents and Assets =====

    fn record_document(
        &mut self,
        run_id: i64,
        url: &str,
        title: Option<&str>,
        path: &str,
        format: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO documents (run_id, url, title, path, format, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(url) DO UPDATE SET
                run_id = excluded.run_id,
                title = excluded.title,
                path = excluded.path,
                format = excluded.format,
                saved_at = excluded.saved_at",
            params![run_id, url, title, path, format, now],
        )?;
        Ok(())
    }

    fn list_documents(&self) -> StorageResult<Vec<DocumentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, url, title, path, format, saved_at FROM documents ORDER BY path",
        )?;

        let documents = stmt
            .query_map([], |row| {
                Ok(DocumentRecord {
                    run_id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    path: row.get(3)?,
                    format: row.get(4)?,
                    saved_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn count_documents(&self, run_id: i64) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM documents WHERE run_id = ?1", run_id)
    }

    fn record_asset(
        &mut self,
        run_id: i64,
        url: &str,
        path: &str,
        size_bytes: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO assets (run_id, url, path, size_bytes, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                run_id = excluded.run_id,
                path = excluded.path,
                size_bytes = excluded.size_bytes,
                saved_at = excluded.saved_at",
            params![run_id, url, path, size_bytes as i64, now],
        )?;
        Ok(())
    }

    fn count_assets(&self, run_id: i64) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM assets WHERE run_id = ?1", run_id)
    }

    // ===== Failures =====

    fn record_failures(
        &mut self,
        run_id: i64,
        failures: &BTreeMap<String, String>,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO failures (run_id, url, reason) VALUES (?1, ?2, ?3)
                 ON CONFLICT(run_id, url) DO UPDATE SET reason = excluded.reason",
            )?;
            for (url, reason) in failures {
                stmt.execute(params![run_id, url, reason])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, reason FROM failures WHERE run_id = ?1 ORDER BY url")?;

        let failures = stmt
            .query_map(params![run_id], |row| {
                Ok(FailureRecord {
                    url: row.get(0)?,
                    reason: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failures)
    }

    // ===== Links =====

    fn record_links(
        &mut self,
        run_id: i64,
        category: LinkCategory,
        urls: &BTreeSet<String>,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO links (run_id, url, category) VALUES (?1, ?2, ?3)",
            )?;
            for url in urls {
                stmt.execute(params![run_id, url, category.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_links_by_category(&self, run_id: i64) -> StorageResult<HashMap<LinkCategory, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) FROM links WHERE run_id = ?1 GROUP BY category",
        )?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (category, count) = row?;
            match LinkCategory::from_db_string(&category) {
                Some(category) => {
                    counts.insert(category, count as u64);
                }
                None => tracing::warn!("Unknown link category in manifest: {}", category),
            }
        }

        Ok(counts)
    }
}
