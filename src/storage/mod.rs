//! Storage module for the content store
//!
//! This module persists every fetched page keyed by its normalized URL,
//! along with bookkeeping for each crawl run:
//! - SQLite database initialization and schema management
//! - Cached page lookup, insertion and clearing
//! - Run tracking for statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{ContentStore, StorageError, StorageResult};

use crate::crawler::FetchMethod;
use chrono::{DateTime, Utc};
use std::path::Path;

/// File name of the content store inside the project directory
pub const STORE_FILE_NAME: &str = "cache.sqlite3";

/// Opens (creating if needed) the content store under a project directory
///
/// # Arguments
///
/// * `project_dir` - Root directory of the project; created if missing
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully opened store
/// * `Err(StorageError)` - The directory or database could not be created
pub fn open_store(project_dir: &Path) -> StorageResult<SqliteStore> {
    std::fs::create_dir_all(project_dir)?;
    SqliteStore::open(&project_dir.join(STORE_FILE_NAME))
}

/// A fetched page as persisted in the content store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    /// Normalized URL (the store key)
    pub url: String,
    pub body: String,
    pub mime: String,
    pub fetched_at: DateTime<Utc>,
    pub strategy_used: FetchMethod,
}

impl CachedPage {
    /// Creates a record stamped with the current time
    pub fn new(
        url: impl Into<String>,
        body: impl Into<String>,
        mime: impl Into<String>,
        strategy_used: FetchMethod,
    ) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            mime: mime.into(),
            fetched_at: Utc::now(),
            strategy_used,
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    StoppedAtLimit,
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::StoppedAtLimit => "stopped_at_limit",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "stopped_at_limit" => Some(Self::StoppedAtLimit),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_from_db_string() {
        assert_eq!(
            RunStatus::from_db_string("stopped_at_limit"),
            Some(RunStatus::StoppedAtLimit)
        );
        assert_eq!(RunStatus::from_db_string("aborted"), Some(RunStatus::Aborted));
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }

    #[test]
    fn test_open_store_creates_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("nested").join("project");

        let store = open_store(&project).unwrap();
        assert!(project.join(STORE_FILE_NAME).exists());
        assert_eq!(store.count().unwrap(), 0);
    }
}
