//! Storage traits and error types
//!
//! This module defines the trait interface for record store backends and
//! associated error types.

use crate::state::JobStatus;
use crate::storage::{DetailRecord, IdentifierRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for record store implementations
///
/// The pipeline shares one store between the discovery loop and every
/// extraction worker. Workers never coordinate with each other; conflicts are
/// resolved here: identifier inserts are insert-if-absent, status and detail
/// writes are last-writer-wins.
pub trait RecordStore: Send {
    // ===== Identifier Queue =====

    /// Inserts identifiers as `pending`, ignoring ones already present
    ///
    /// This is one bulk operation regardless of batch size.
    ///
    /// # Returns
    ///
    /// The number of identifiers that were newly inserted
    fn upsert_pending(&mut self, ids: &[String], origin_tag: &str) -> StorageResult<usize>;

    /// Lists pending identifiers, optionally restricted to one origin tag
    fn list_pending(&self, origin_tag: Option<&str>) -> StorageResult<Vec<IdentifierRecord>>;

    /// Sets the status of an identifier
    fn set_status(&mut self, id: &str, status: JobStatus) -> StorageResult<()>;

    /// Gets an identifier record by ID
    fn get_identifier(&self, id: &str) -> StorageResult<Option<IdentifierRecord>>;

    // ===== Detail Records =====

    /// Inserts or overwrites the detail record for an identifier
    fn upsert_detail(&mut self, detail: &DetailRecord) -> StorageResult<()>;

    /// Writes the detail record and marks its identifier `completed` atomically
    ///
    /// Either both writes land or neither does, so `completed` always implies
    /// a detail record exists.
    fn complete_with_detail(&mut self, detail: &DetailRecord) -> StorageResult<()>;

    /// Gets a detail record by identifier
    fn get_detail(&self, id: &str) -> StorageResult<Option<DetailRecord>>;

    // ===== Recovery =====

    /// Resets `completed` identifiers without a detail record back to `pending`
    ///
    /// # Returns
    ///
    /// The number of identifiers reset
    fn reset_orphaned_completions(&mut self) -> StorageResult<usize>;

    // ===== Statistics =====

    /// Counts identifiers in a status
    fn count_by_status(&self, status: JobStatus) -> StorageResult<u64>;

    /// Counts stored detail records
    fn count_details(&self) -> StorageResult<u64>;
}
