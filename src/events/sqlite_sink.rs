//! SQLite-backed event sink
//!
//! Records pipeline events in the `scraper_events` table of the same database
//! the record store uses.

use crate::events::traits::{EventKind, EventSink, PipelineEvent, SinkError};
use crate::storage::{lock_store, SharedStore, SqliteStorage};

/// Event sink writing to the database event log
///
/// Phase lifecycle events are always recorded. Per-job events stay out of
/// the table; per-page discovery events are recorded only when
/// `record_discovery_details` is set.
pub struct SqliteEventSink {
    storage: SharedStore<SqliteStorage>,
    process_name: String,
    record_discovery_details: bool,
}

impl SqliteEventSink {
    /// Creates a new SQLite event sink
    ///
    /// # Arguments
    ///
    /// * `storage` - The shared storage backend to write to
    /// * `process_name` - Name stamped on every recorded event
    /// * `record_discovery_details` - Whether to record one row per discovery page
    pub fn new(
        storage: SharedStore<SqliteStorage>,
        process_name: impl Into<String>,
        record_discovery_details: bool,
    ) -> Self {
        Self {
            storage,
            process_name: process_name.into(),
            record_discovery_details,
        }
    }

    fn should_record(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::DiscoveryIteration => self.record_discovery_details,
            other => !other.is_fine_grained(),
        }
    }
}

impl EventSink for SqliteEventSink {
    fn emit(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        if !self.should_record(event.kind) {
            return Ok(());
        }

        let mut storage = lock_store(&self.storage)?;
        storage.insert_event(
            &self.process_name,
            event.kind.as_str(),
            event.records_count,
            event.status.as_str(),
            event
                .execution_time
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            event.error_message.as_deref(),
        )?;

        tracing::debug!("Recorded {} event ({} records)", event.kind, event.records_count);
        Ok(())
    }
}
