//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - The durable identifier queue and its lifecycle status
//! - Detail record persistence
//! - The pipeline event log

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{RecordStore, StorageError, StorageResult};

use crate::state::{DetailStatus, JobStatus};
use crate::TrawlError;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A record store shared between the discovery loop and extraction workers
pub type SharedStore<S> = Arc<Mutex<S>>;

/// Wraps a store for sharing across tasks
pub fn share<S: RecordStore>(store: S) -> SharedStore<S> {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store, mapping a poisoned lock to a storage error
pub fn lock_store<S>(store: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    store.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(TrawlError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, TrawlError> {
    SqliteStorage::new(path)
}

/// A discovered job identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRecord {
    pub id: String,
    pub status: JobStatus,
    pub origin_tag: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Structured content extracted for one job
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub id: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub origin_tag: Option<String>,
    /// Raw relative posting age, e.g. "3 days ago"
    pub posted_time: Option<String>,
    /// Absolute timestamp derived from `posted_time`
    pub published_at: Option<DateTime<Utc>>,
    pub applicant_count: Option<String>,
    pub description: Option<String>,
    pub seniority_level: Option<String>,
    pub employment_type: Option<String>,
    pub job_function: Option<String>,
    pub industries: Option<String>,
    pub url: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub status: DetailStatus,
}

impl DetailRecord {
    /// Creates a detail record with every extracted attribute unset
    pub fn empty(id: impl Into<String>, extracted_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: None,
            company: None,
            location: None,
            origin_tag: None,
            posted_time: None,
            published_at: None,
            applicant_count: None,
            description: None,
            seniority_level: None,
            employment_type: None,
            job_function: None,
            industries: None,
            url: None,
            extracted_at,
            status: DetailStatus::Processing,
        }
    }
}

/// A row of the pipeline event log
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: i64,
    pub process_name: String,
    pub event_type: String,
    pub records_count: u64,
    pub status: String,
    pub execution_time_seconds: f64,
    pub error_message: Option<String>,
    pub created_at: String,
}
