//! Record store trait and error types

use crate::storage::{Record, StoreStats};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during record store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Unsupported database URL: {0}")]
    BadDatabaseUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for record store backends
///
/// Backends are selected once at construction (`open_store`); the harvester
/// never inspects which implementation it holds.
pub trait RecordStore {
    /// Returns every source id already persisted
    ///
    /// Called once at startup to seed the in-memory seen set, which is what
    /// makes an interrupted run resumable without per-record lookups.
    fn preload_existing_ids(&self) -> StoreResult<HashSet<String>>;

    /// Inserts a record, or does nothing if its source id already exists
    ///
    /// Re-insertion of an existing id is a no-op, never an error and never a
    /// duplicate row. Returns `true` unless the backend itself failed.
    fn upsert(&mut self, record: &Record) -> StoreResult<bool>;

    /// Records the outcome of a download attempt
    ///
    /// Sets the downloaded flag and local path, and increments the record's
    /// attempt counter by the number of tries the pipeline actually made.
    fn update_download_status(
        &mut self,
        source_id: &str,
        local_path: Option<&str>,
        success: bool,
        attempts: u32,
    ) -> StoreResult<()>;

    /// Returns aggregate counts
    fn stats(&self) -> StoreResult<StoreStats>;
}
