//! Event module for pipeline progress and outcome reporting
//!
//! This module handles:
//! - The `EventSink` trait and structured `PipelineEvent` records
//! - Structured log output for every event
//! - Persisting lifecycle events to the database event log

mod sqlite_sink;
mod tracing_sink;
mod traits;

pub use sqlite_sink::SqliteEventSink;
pub use tracing_sink::TracingSink;
pub use traits::{
    emit_best_effort, EventKind, EventSink, EventStatus, Phase, PipelineEvent, SinkError,
};

use std::sync::Arc;

/// Forwards each event to several sinks
///
/// Every sink receives the event even if an earlier one fails; the first
/// error is returned.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all events received so far
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Counts received events of one kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|_| SinkError::Write("event buffer lock poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _event: &PipelineEvent) -> Result<(), SinkError> {
            Err(SinkError::Write("down".to_string()))
        }
    }

    #[test]
    fn test_fanout_delivers_past_failures() {
        let memory = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(memory.clone());

        let result = fanout.emit(&PipelineEvent::new(EventKind::DiscoveryStarted));

        assert!(result.is_err());
        assert_eq!(memory.count(EventKind::DiscoveryStarted), 1);
    }

    #[test]
    fn test_empty_fanout_is_ok() {
        let fanout = FanoutSink::new();
        assert!(fanout.is_empty());
        assert!(fanout
            .emit(&PipelineEvent::new(EventKind::DiscoveryStarted))
            .is_ok());
    }
}
