//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Jobtrawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Discovered job identifiers and their extraction lifecycle
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'pending',
    origin_tag TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_jobs_origin_tag ON jobs(origin_tag);

-- Extracted detail records, one per job
CREATE TABLE IF NOT EXISTS job_details (
    id TEXT PRIMARY KEY,
    title TEXT,
    company TEXT,
    location TEXT,
    origin_tag TEXT,
    posted_time TEXT,
    published_at TEXT,
    applicant_count TEXT,
    description TEXT,
    seniority_level TEXT,
    employment_type TEXT,
    job_function TEXT,
    industries TEXT,
    url TEXT,
    extracted_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'processing'
);

-- Pipeline event log
CREATE TABLE IF NOT EXISTS scraper_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_name TEXT NOT NULL,
    event_type TEXT NOT NULL,
    records_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'success',
    execution_time_seconds REAL NOT NULL DEFAULT 0.0,
    error_message TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scraper_events_process ON scraper_events(process_name);
CREATE INDEX IF NOT EXISTS idx_scraper_events_type ON scraper_events(event_type);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["jobs", "job_details", "scraper_events"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
