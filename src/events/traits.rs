//! Event sink trait and event types
//!
//! Events are a side channel: the pipeline emits them for operators and never
//! depends on delivery.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while delivering an event
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write event: {0}")]
    Write(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Pipeline phase an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Extraction,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Extraction => "extraction",
        }
    }
}

/// Named pipeline events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    DiscoveryStarted,
    DiscoveryIteration,
    NoIdsFound,
    DiscoveryCompleted,
    ExtractionStarted,
    JobCompleted,
    JobFailed,
    ExtractionProgress,
    ExtractionCompleted,
    CircuitTripped(Phase),
}

impl EventKind {
    /// Event type name as recorded by sinks
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscoveryStarted => "discovery_started",
            Self::DiscoveryIteration => "discovery_iteration",
            Self::NoIdsFound => "no_ids_found",
            Self::DiscoveryCompleted => "discovery_completed",
            Self::ExtractionStarted => "extraction_started",
            Self::JobCompleted => "job_completed",
            Self::JobFailed => "job_failed",
            Self::ExtractionProgress => "extraction_progress",
            Self::ExtractionCompleted => "extraction_completed",
            Self::CircuitTripped(_) => "circuit_tripped",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::DiscoveryStarted
            | Self::DiscoveryIteration
            | Self::NoIdsFound
            | Self::DiscoveryCompleted => Phase::Discovery,
            Self::ExtractionStarted
            | Self::JobCompleted
            | Self::JobFailed
            | Self::ExtractionProgress
            | Self::ExtractionCompleted => Phase::Extraction,
            Self::CircuitTripped(phase) => *phase,
        }
    }

    /// Per-job and per-page events, as opposed to phase lifecycle events
    pub fn is_fine_grained(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryIteration
                | Self::JobCompleted
                | Self::JobFailed
                | Self::ExtractionProgress
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Success,
    Partial,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// One structured pipeline event
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineEvent {
    pub kind: EventKind,
    pub records_count: u64,
    pub status: EventStatus,
    pub execution_time: Option<Duration>,
    pub error_message: Option<String>,
    /// Job identifier for per-job events
    pub job_id: Option<String>,
}

impl PipelineEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            records_count: 0,
            status: EventStatus::Success,
            execution_time: None,
            error_message: None,
            job_id: None,
        }
    }

    pub fn with_records(mut self, count: u64) -> Self {
        self.records_count = count;
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed);
        self
    }

    pub fn with_job(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    /// Marks the event failed with an error message
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = EventStatus::Failed;
        self.error_message = Some(message.into());
        self
    }
}

/// Trait for event sink implementations
///
/// Sinks may fail; callers go through [`emit_best_effort`] so a failing sink
/// never changes pipeline control flow.
pub trait EventSink: Send + Sync {
    /// Delivers one event
    fn emit(&self, event: &PipelineEvent) -> Result<(), SinkError>;
}

/// Emits an event, logging and discarding any sink error
pub fn emit_best_effort(sink: &dyn EventSink, event: PipelineEvent) {
    if let Err(e) = sink.emit(&event) {
        tracing::warn!("Failed to emit {} event: {}", event.kind, e);
    }
}
