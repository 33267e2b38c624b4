//! Storage module for the crawl run manifest
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Run tracking (start URL, config hash, final counts, status)
//! - Saved documents and assets, used to rebuild the index
//! - Failures and categorized links, used for statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::ScribeError;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(ScribeError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ScribeError> {
    SqliteStorage::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub start_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_downloaded: u64,
    pub assets_downloaded: u64,
}

/// A saved document
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub run_id: i64,
    pub url: String,
    pub title: Option<String>,
    /// Path relative to the output directory, `/`-separated
    pub path: String,
    pub format: String,
    pub saved_at: String,
}

/// A failed URL and the last error seen for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub reason: String,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
