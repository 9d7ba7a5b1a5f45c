//! Discovery loop - pages through the listing endpoint and queues identifiers
//!
//! Each page is fetched at an offset, identifiers are extracted and upserted
//! into the record store as `pending`, and the offset advances by the number
//! of identifiers found. The loop ends on the first page with no identifiers
//! or the first fetch that fails.

use crate::config::Config;
use crate::crawler::breaker::CircuitBreaker;
use crate::crawler::fetcher::{fetch_with_retry, FetchFailure, FetchPolicy};
use crate::crawler::parser::{IdentifierExtractor, PatternExtractor};
use crate::events::{emit_best_effort, EventKind, EventSink, EventStatus, Phase, PipelineEvent};
use crate::storage::{lock_store, RecordStore, SharedStore};
use crate::TrawlError;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Why the discovery loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A page yielded no identifiers
    Exhausted,
    /// A page could not be fetched
    FetchFailed(FetchFailure),
}

/// Summary of one discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Pages fetched successfully
    pub pages: u64,
    /// Offset of the page the loop stopped at
    pub final_offset: u64,
    /// Identifiers seen across all pages, duplicates included
    pub ids_found: u64,
    /// Identifiers newly queued
    pub ids_inserted: u64,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

/// Builds the listing URL for a page offset
///
/// Query parameters are appended to any the base URL already carries.
pub fn build_listing_url(base: &Url, location: &str, recency: &str, offset: u64) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("location", location)
        .append_pair("f_TPR", recency)
        .append_pair("pageNum", "0")
        .append_pair("start", &offset.to_string());
    url
}

/// The discovery loop and everything it needs
pub struct DiscoveryLoop<S: RecordStore> {
    client: Client,
    listing_url: Url,
    location: String,
    recency: String,
    extractor: Arc<dyn IdentifierExtractor>,
    policy: FetchPolicy,
    store: SharedStore<S>,
    events: Arc<dyn EventSink>,
}

impl<S: RecordStore> DiscoveryLoop<S> {
    /// Creates a discovery loop from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `client` - HTTP client used for listing pages
    /// * `store` - Record store receiving discovered identifiers
    /// * `events` - Sink for progress events
    pub fn new(
        config: &Config,
        client: Client,
        store: SharedStore<S>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, TrawlError> {
        let listing_url = Url::parse(&config.target.listing_url)?;
        let extractor = PatternExtractor::new(&config.target.id_pattern)?;
        let breaker = Arc::new(CircuitBreaker::new(config.thresholds));

        Ok(Self {
            client,
            listing_url,
            location: config.target.location.clone(),
            recency: config.target.recency.clone(),
            extractor: Arc::new(extractor),
            policy: FetchPolicy::new(
                config.discovery.max_retries,
                config.discovery.retry_delay(),
                breaker,
            ),
            store,
            events,
        })
    }

    /// Replaces the identifier extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn IdentifierExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replaces the circuit breaker, e.g. to share a stop signal with the caller
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.policy.breaker = breaker;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.policy.breaker
    }

    /// The listing endpoint answers past its last page with an empty
    /// placeholder body; that ends the listing unless it tripped the breaker.
    fn is_placeholder_end(&self, failure: &FetchFailure) -> bool {
        *failure == FetchFailure::EmptyBody && self.policy.breaker.tripped_by().is_none()
    }

    /// Runs the loop to completion
    ///
    /// Fetch failures end the loop and are reported in the returned
    /// [`DiscoveryReport`]; only storage failures return an error.
    pub async fn run(&self) -> Result<DiscoveryReport, TrawlError> {
        let started = Instant::now();
        tracing::info!(
            "Starting discovery for location {:?} (recency {})",
            self.location,
            self.recency
        );
        emit_best_effort(self.events.as_ref(), PipelineEvent::new(EventKind::DiscoveryStarted));

        let mut offset: u64 = 0;
        let mut pages: u64 = 0;
        let mut ids_found: u64 = 0;
        let mut ids_inserted: u64 = 0;

        let stop_reason = loop {
            let url = build_listing_url(&self.listing_url, &self.location, &self.recency, offset);

            let payload = match fetch_with_retry(&self.client, url.as_str(), &self.policy).await {
                Ok(payload) => payload,
                Err(failure) if self.is_placeholder_end(&failure) => {
                    tracing::info!("Empty page at offset {}, listing exhausted", offset);
                    emit_best_effort(
                        self.events.as_ref(),
                        PipelineEvent::new(EventKind::NoIdsFound).with_records(offset),
                    );
                    break StopReason::FetchFailed(failure);
                }
                Err(failure) => {
                    tracing::warn!("Discovery stopped at offset {}: {}", offset, failure);
                    break StopReason::FetchFailed(failure);
                }
            };
            pages += 1;

            let ids = self.extractor.extract(&payload);
            if ids.is_empty() {
                tracing::info!("No identifiers at offset {}, listing exhausted", offset);
                emit_best_effort(
                    self.events.as_ref(),
                    PipelineEvent::new(EventKind::NoIdsFound).with_records(offset),
                );
                break StopReason::Exhausted;
            }

            let inserted = {
                let mut store = lock_store(&self.store)?;
                store.upsert_pending(&ids, &self.location)?
            };

            let found = ids.len() as u64;
            ids_found += found;
            ids_inserted += inserted as u64;
            tracing::info!(
                "Found {} identifiers at offset {} ({} new)",
                found,
                offset,
                inserted
            );
            emit_best_effort(
                self.events.as_ref(),
                PipelineEvent::new(EventKind::DiscoveryIteration).with_records(found),
            );

            offset += found;
        };

        let elapsed = started.elapsed();

        if let Some(class) = self.policy.breaker.tripped_by() {
            emit_best_effort(
                self.events.as_ref(),
                PipelineEvent::new(EventKind::CircuitTripped(Phase::Discovery))
                    .with_records(offset)
                    .failed(format!("{} threshold reached", class.as_str())),
            );
        }

        let completed = PipelineEvent::new(EventKind::DiscoveryCompleted)
            .with_records(offset)
            .with_elapsed(elapsed);
        let completed = match &stop_reason {
            StopReason::Exhausted => completed,
            StopReason::FetchFailed(failure) if self.is_placeholder_end(failure) => completed,
            StopReason::FetchFailed(failure) => completed
                .failed(failure.to_string())
                .with_status(EventStatus::Partial),
        };
        emit_best_effort(self.events.as_ref(), completed);

        tracing::info!(
            "Discovery finished: {} pages, {} identifiers ({} new), final offset {}",
            pages,
            ids_found,
            ids_inserted,
            offset
        );

        Ok(DiscoveryReport {
            pages,
            final_offset: offset,
            ids_found,
            ids_inserted,
            stop_reason,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_listing_url() {
        let base = Url::parse("https://jobs.example.com/api/search").unwrap();
        let url = build_listing_url(&base, "Chile", "r86400", 250);
        assert_eq!(
            url.as_str(),
            "https://jobs.example.com/api/search?location=Chile&f_TPR=r86400&pageNum=0&start=250"
        );
    }

    #[test]
    fn test_build_listing_url_encodes_location() {
        let base = Url::parse("https://jobs.example.com/api/search").unwrap();
        let url = build_listing_url(&base, "New York, NY", "r604800", 0);
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("location".to_string(), "New York, NY".to_string()));
        assert_eq!(pairs[3], ("start".to_string(), "0".to_string()));
    }

    #[test]
    fn test_build_listing_url_keeps_existing_query() {
        let base = Url::parse("https://jobs.example.com/api/search?keywords=rust").unwrap();
        let url = build_listing_url(&base, "Chile", "r86400", 25);
        assert!(url.as_str().starts_with("https://jobs.example.com/api/search?keywords=rust&location=Chile"));
    }
}
