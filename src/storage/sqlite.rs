//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::state::{DetailStatus, JobStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{DetailRecord, EventRecord, IdentifierRecord};
use crate::TrawlError;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

/// Identifiers per INSERT statement; keeps bound parameters well under SQLite's limit
const INSERT_CHUNK: usize = 500;

const DETAIL_COLUMNS: &str = "id, title, company, location, origin_tag, posted_time, published_at,
     applicant_count, description, seniority_level, employment_type, job_function, industries,
     url, extracted_at, status";

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
    /// * `Err(TrawlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, TrawlError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, TrawlError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Event Log =====

    /// Appends a row to the pipeline event log
    pub fn insert_event(
        &mut self,
        process_name: &str,
        event_type: &str,
        records_count: u64,
        status: &str,
        execution_time_seconds: f64,
        error_message: Option<&str>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO scraper_events
             (process_name, event_type, records_count, status, execution_time_seconds, error_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                process_name,
                event_type,
                records_count as i64,
                status,
                execution_time_seconds,
                error_message,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Gets the most recent events, newest first
    pub fn recent_events(&self, limit: usize) -> StorageResult<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, process_name, event_type, records_count, status,
             execution_time_seconds, error_message, created_at
             FROM scraper_events ORDER BY id DESC LIMIT ?1",
        )?;

        let events = stmt
            .query_map(params![limit as i64], |row| {
                Ok(EventRecord {
                    id: row.get(0)?,
                    process_name: row.get(1)?,
                    event_type: row.get(2)?,
                    records_count: row.get::<_, i64>(3)? as u64,
                    status: row.get(4)?,
                    execution_time_seconds: row.get(5)?,
                    error_message: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }
}

fn identifier_from_row(row: &Row<'_>) -> rusqlite::Result<IdentifierRecord> {
    Ok(IdentifierRecord {
        id: row.get(0)?,
        status: JobStatus::from_db_string(&row.get::<_, String>(1)?).unwrap_or(JobStatus::Failed),
        origin_tag: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<DetailRecord> {
    let extracted_at: String = row.get(14)?;
    Ok(DetailRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        company: row.get(2)?,
        location: row.get(3)?,
        origin_tag: row.get(4)?,
        posted_time: row.get(5)?,
        published_at: parse_timestamp(row.get(6)?),
        applicant_count: row.get(7)?,
        description: row.get(8)?,
        seniority_level: row.get(9)?,
        employment_type: row.get(10)?,
        job_function: row.get(11)?,
        industries: row.get(12)?,
        url: row.get(13)?,
        extracted_at: parse_timestamp(Some(extracted_at)).unwrap_or_else(Utc::now),
        status: DetailStatus::from_db_string(&row.get::<_, String>(15)?)
            .unwrap_or(DetailStatus::Processing),
    })
}

fn write_detail(conn: &Connection, detail: &DetailRecord) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO job_details ({DETAIL_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                company = excluded.company,
                location = excluded.location,
                origin_tag = excluded.origin_tag,
                posted_time = excluded.posted_time,
                published_at = excluded.published_at,
                applicant_count = excluded.applicant_count,
                description = excluded.description,
                seniority_level = excluded.seniority_level,
                employment_type = excluded.employment_type,
                job_function = excluded.job_function,
                industries = excluded.industries,
                url = excluded.url,
                extracted_at = excluded.extracted_at,
                status = excluded.status"
        ),
        params![
            detail.id,
            detail.title,
            detail.company,
            detail.location,
            detail.origin_tag,
            detail.posted_time,
            detail.published_at.map(|dt| dt.to_rfc3339()),
            detail.applicant_count,
            detail.description,
            detail.seniority_level,
            detail.employment_type,
            detail.job_function,
            detail.industries,
            detail.url,
            detail.extracted_at.to_rfc3339(),
            detail.status.to_db_string(),
        ],
    )?;
    Ok(())
}

fn write_status(conn: &Connection, id: &str, status: JobStatus) -> StorageResult<()> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.to_db_string(), now, id],
    )?;

    if changed == 0 {
        return Err(StorageError::JobNotFound(id.to_string()));
    }
    Ok(())
}

impl RecordStore for SqliteStorage {
    // ===== Identifier Queue =====

    fn upsert_pending(&mut self, ids: &[String], origin_tag: &str) -> StorageResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        for chunk in ids.chunks(INSERT_CHUNK) {
            // ?1 = origin tag, ?2 = timestamp, ?3.. = identifiers
            let values = (0..chunk.len())
                .map(|i| format!("(?{}, 'pending', ?1, ?2, ?2)", i + 3))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO jobs (id, status, origin_tag, created_at, updated_at) VALUES {}
                 ON CONFLICT(id) DO NOTHING",
                values
            );

            let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() + 2);
            bound.push(&origin_tag);
            bound.push(&now);
            for id in chunk {
                bound.push(id);
            }

            inserted += tx.execute(&sql, params_from_iter(bound))?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn list_pending(&self, origin_tag: Option<&str>) -> StorageResult<Vec<IdentifierRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status, origin_tag, created_at, updated_at FROM jobs
             WHERE status = ?1 AND (?2 IS NULL OR origin_tag = ?2)
             ORDER BY created_at, id",
        )?;

        let jobs = stmt
            .query_map(
                params![JobStatus::Pending.to_db_string(), origin_tag],
                identifier_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    fn set_status(&mut self, id: &str, status: JobStatus) -> StorageResult<()> {
        write_status(&self.conn, id, status)
    }

    fn get_identifier(&self, id: &str) -> StorageResult<Option<IdentifierRecord>> {
        let job = self
            .conn
            .query_row(
                "SELECT id, status, origin_tag, created_at, updated_at FROM jobs WHERE id = ?1",
                params![id],
                identifier_from_row,
            )
            .optional()?;
        Ok(job)
    }

    // ===== Detail Records =====

    fn upsert_detail(&mut self, detail: &DetailRecord) -> StorageResult<()> {
        write_detail(&self.conn, detail)?;
        Ok(())
    }

    fn complete_with_detail(&mut self, detail: &DetailRecord) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        write_detail(&tx, detail)?;
        write_status(&tx, &detail.id, JobStatus::Completed)?;
        tx.commit()?;
        Ok(())
    }

    fn get_detail(&self, id: &str) -> StorageResult<Option<DetailRecord>> {
        let detail = self
            .conn
            .query_row(
                &format!("SELECT {DETAIL_COLUMNS} FROM job_details WHERE id = ?1"),
                params![id],
                detail_from_row,
            )
            .optional()?;
        Ok(detail)
    }

    // ===== Recovery =====

    fn reset_orphaned_completions(&mut self) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let reset = self.conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2
             WHERE status = ?3 AND id NOT IN (SELECT id FROM job_details)",
            params![
                JobStatus::Pending.to_db_string(),
                now,
                JobStatus::Completed.to_db_string()
            ],
        )?;
        Ok(reset)
    }

    // ===== Statistics =====

    fn count_by_status(&self, status: JobStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_details(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM job_details", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
