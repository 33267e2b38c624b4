//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{DocumentRecord, FailureRecord, RunRecord, RunStatus};
use crate::url::LinkCategory;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("No crawl runs recorded")]
    NoRuns,

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every manifest operation the crawler and the CLI need.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `start_url` - The primary start URL
    /// * `config_hash` - Hash of the configuration source
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, start_url: &str, config_hash: &str) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Finishes a run with its final status and counters
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_downloaded: u64,
        assets_downloaded: u64,
    ) -> StorageResult<()>;

    // ===== Documents and Assets =====

    /// Records a saved document, replacing any earlier row for the same URL
    fn record_document(
        &mut self,
        run_id: i64,
        url: &str,
        title: Option<&str>,
        path: &str,
        format: &str,
    ) -> StorageResult<()>;

    /// All saved documents ordered by path
    fn list_documents(&self) -> StorageResult<Vec<DocumentRecord>>;

    fn count_documents(&self, run_id: i64) -> StorageResult<u64>;

    fn record_asset(&mut self, run_id: i64, url: &str, path: &str, size_bytes: u64)
        -> StorageResult<()>;

    fn count_assets(&self, run_id: i64) -> StorageResult<u64>;

    // ===== Failures =====

    /// Records the failed-URL map of a run in one transaction
    fn record_failures(
        &mut self,
        run_id: i64,
        failures: &BTreeMap<String, String>,
    ) -> StorageResult<()>;

    fn list_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>>;

    // ===== Links =====

    /// Records one categorized link set in one transaction
    fn record_links(
        &mut self,
        run_id: i64,
        category: LinkCategory,
        urls: &BTreeSet<String>,
    ) -> StorageResult<()>;

    /// Counts recorded links per category
    fn count_links_by_category(&self, run_id: i64) -> StorageResult<HashMap<LinkCategory, u64>>;
}
