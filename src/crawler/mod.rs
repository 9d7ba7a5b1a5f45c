//! Crawler module for listing discovery and detail extraction
//!
//! This module contains the core pipeline logic, including:
//! - The shared circuit breaker and stop signal
//! - HTTP fetching with retry and failure classification
//! - Listing and detail payload parsing
//! - The discovery loop and the extraction worker pool

mod breaker;
mod discovery;
mod extraction;
mod fetcher;
mod parser;
mod posted_time;

pub use breaker::{BreakerDecision, CircuitBreaker, FailureClass, FailureCounts};
pub use discovery::{build_listing_url, DiscoveryLoop, DiscoveryReport, StopReason};
pub use extraction::{
    build_detail, detail_url_for, ExtractionPool, ExtractionReport, JobOutcome,
};
pub use fetcher::{
    build_http_client, fetch_with_retry, is_unusable_body, FetchFailure, FetchPolicy,
    PLACEHOLDER_BODY,
};
pub use parser::{
    DetailParser, HtmlDetailParser, IdentifierExtractor, ParseError, ParsedPosting,
    PatternExtractor,
};
pub use posted_time::parse_posted_time;

use crate::config::Config;
use crate::events::EventSink;
use crate::storage::{RecordStore, SharedStore};
use crate::TrawlError;
use reqwest::Client;
use std::sync::Arc;

/// Runs one discovery pass
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `client` - HTTP client for listing requests
/// * `store` - Record store receiving pending identifiers
/// * `events` - Sink for progress events
///
/// # Returns
///
/// * `Ok(DiscoveryReport)` - Loop ended on an empty page or a fetch failure
/// * `Err(TrawlError)` - Setup or storage failed
pub async fn run_discovery<S: RecordStore>(
    config: &Config,
    client: Client,
    store: SharedStore<S>,
    events: Arc<dyn EventSink>,
) -> Result<DiscoveryReport, TrawlError> {
    DiscoveryLoop::new(config, client, store, events)?.run().await
}

/// Runs one extraction pass over the pending jobs for the configured location
pub async fn run_extraction<S: RecordStore + 'static>(
    config: &Config,
    client: Client,
    store: SharedStore<S>,
    events: Arc<dyn EventSink>,
) -> Result<ExtractionReport, TrawlError> {
    ExtractionPool::new(config, client, store, events)?.run().await
}
