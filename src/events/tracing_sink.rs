//! Event sink that renders events as structured log lines

use crate::events::traits::{EventSink, EventStatus, PipelineEvent, SinkError};

/// Writes every event through `tracing`
///
/// With the JSON log format enabled, each event becomes one JSON object with
/// `event_type`, `phase`, `records_count`, and `status` fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        let elapsed_secs = event.execution_time.map(|d| d.as_secs_f64());
        let job_id = event.job_id.as_deref().unwrap_or("");
        let error = event.error_message.as_deref().unwrap_or("");

        match (event.status, event.kind.is_fine_grained()) {
            (EventStatus::Failed, _) => tracing::warn!(
                event_type = event.kind.as_str(),
                phase = event.kind.phase().as_str(),
                records_count = event.records_count,
                status = event.status.as_str(),
                elapsed_secs,
                job_id,
                error,
                "Event: {}",
                event.kind
            ),
            (_, true) => tracing::debug!(
                event_type = event.kind.as_str(),
                phase = event.kind.phase().as_str(),
                records_count = event.records_count,
                status = event.status.as_str(),
                elapsed_secs,
                job_id,
                "Event: {}",
                event.kind
            ),
            (_, false) => tracing::info!(
                event_type = event.kind.as_str(),
                phase = event.kind.phase().as_str(),
                records_count = event.records_count,
                status = event.status.as_str(),
                elapsed_secs,
                "Event: {}",
                event.kind
            ),
        }

        Ok(())
    }
}
