//! Storage traits and error types
//!
//! This module defines the content store interface and its error type.

use crate::crawler::FetchMethod;
use crate::storage::{CachedPage, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt cache entry for {url}: {reason}")]
    CorruptEntry { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for content store implementations
///
/// The store is shared by every worker of a crawl session; callers serialize
/// access through a lock, so implementations only need to be `Send`.
pub trait ContentStore: Send {
    // ===== Cached Pages =====

    /// Looks up a page by its normalized URL
    fn get(&self, url: &str) -> StorageResult<Option<CachedPage>>;

    /// Stores a page, superseding any previous entry for the same URL
    fn put(&mut self, page: &CachedPage) -> StorageResult<()>;

    /// Removes every cached page
    ///
    /// # Returns
    ///
    /// The number of entries removed
    fn clear(&mut self) -> StorageResult<u64>;

    /// Counts cached pages
    fn count(&self) -> StorageResult<u64>;

    /// Counts cached pages fetched with the given method
    fn count_by_method(&self, method: FetchMethod) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the final status and finish time of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Returns up to `limit` runs, most recent first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
