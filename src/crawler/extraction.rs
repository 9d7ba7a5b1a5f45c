//! Extraction pool - fetches and parses detail pages for pending jobs
//!
//! Pending identifiers are loaded into one shared queue drained by a fixed
//! number of worker tasks. A parser panic fails only the job being parsed.
//! Workers stop taking jobs once the pool's stop signal is set; jobs not yet
//! taken stay `pending` for the next run.

use crate::config::{BreakerScope, Config};
use crate::crawler::breaker::{CircuitBreaker, FailureClass};
use crate::crawler::fetcher::{fetch_with_retry, FetchFailure, FetchPolicy};
use crate::crawler::parser::{DetailParser, HtmlDetailParser, ParsedPosting};
use crate::crawler::posted_time::parse_posted_time;
use crate::events::{emit_best_effort, EventKind, EventSink, EventStatus, Phase, PipelineEvent};
use crate::state::{DetailStatus, JobStatus};
use crate::storage::{
    lock_store, DetailRecord, IdentifierRecord, RecordStore, SharedStore, StorageResult,
};
use crate::TrawlError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Outcome of processing one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Detail persisted and job marked `completed`
    Completed,
    /// Job marked `failed`
    Failed(String),
    /// Stop signal set before the job finished; job left `pending`
    Aborted,
}

/// Summary of one extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Pending jobs loaded into the queue
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
    /// Jobs still `pending`: aborted mid-fetch or never taken from the queue
    pub left_pending: u64,
    /// Jobs found `completed` without a detail record and reset to `pending`
    pub orphans_reset: u64,
    /// Failure class that tripped the pool breaker, if any
    pub tripped_by: Option<FailureClass>,
    pub elapsed: Duration,
}

/// Builds the detail URL for a job identifier
pub fn detail_url_for(base: &str, id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}

/// Assembles the detail record for a parsed posting
///
/// `published_at` is derived from the relative posting age against
/// `extracted_at`.
pub fn build_detail(
    job: &IdentifierRecord,
    url: &str,
    posting: ParsedPosting,
    extracted_at: DateTime<Utc>,
) -> DetailRecord {
    let published_at = posting
        .posted_time
        .as_deref()
        .and_then(|text| parse_posted_time(text, extracted_at));

    DetailRecord {
        id: job.id.clone(),
        title: posting.title,
        company: posting.company,
        location: posting.location,
        origin_tag: Some(job.origin_tag.clone()),
        posted_time: posting.posted_time,
        published_at,
        applicant_count: posting.applicant_count,
        description: posting.description,
        seniority_level: posting.seniority_level,
        employment_type: posting.employment_type,
        job_function: posting.job_function,
        industries: posting.industries,
        url: Some(url.to_string()),
        extracted_at,
        status: DetailStatus::Completed,
    }
}

#[derive(Debug, Default)]
struct Tally {
    processed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// State shared by every worker of one pool invocation
struct WorkerContext<S> {
    client: Client,
    detail_url: Arc<str>,
    store: SharedStore<S>,
    parser: Arc<dyn DetailParser>,
    events: Arc<dyn EventSink>,
    breaker: Arc<CircuitBreaker>,
    scope: BreakerScope,
    max_attempts: u32,
    base_delay: Duration,
    progress_every: u64,
    queue: Arc<Mutex<VecDeque<IdentifierRecord>>>,
    tally: Arc<Tally>,
}

impl<S> Clone for WorkerContext<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            detail_url: Arc::clone(&self.detail_url),
            store: Arc::clone(&self.store),
            parser: Arc::clone(&self.parser),
            events: Arc::clone(&self.events),
            breaker: Arc::clone(&self.breaker),
            scope: self.scope,
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            progress_every: self.progress_every,
            queue: Arc::clone(&self.queue),
            tally: Arc::clone(&self.tally),
        }
    }
}

impl<S: RecordStore + 'static> WorkerContext<S> {
    fn next_job(&self) -> Option<IdentifierRecord> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    fn policy_for_job(&self) -> FetchPolicy {
        let breaker = match self.scope {
            BreakerScope::Pool => Arc::clone(&self.breaker),
            BreakerScope::Unit => Arc::new(self.breaker.child()),
        };
        FetchPolicy::new(self.max_attempts, self.base_delay, breaker)
    }

    fn mark(&self, id: &str, status: JobStatus) -> StorageResult<()> {
        let mut store = lock_store(&self.store)?;
        store.set_status(id, status)
    }

    fn fail(&self, id: &str, reason: String) -> JobOutcome {
        tracing::warn!("Job {} failed: {}", id, reason);
        if let Err(e) = self.mark(id, JobStatus::Failed) {
            tracing::error!("Could not mark job {} failed: {}", id, e);
        }
        JobOutcome::Failed(reason)
    }

    fn complete(&self, job: &IdentifierRecord, url: &str, payload: &str) -> JobOutcome {
        let parsed = panic::catch_unwind(AssertUnwindSafe(|| self.parser.parse(payload)));
        let posting = match parsed {
            Ok(Ok(posting)) => posting,
            Ok(Err(e)) => return self.fail(&job.id, format!("parse error: {}", e)),
            Err(cause) => {
                let message = format!("parser panicked: {}", panic_message(cause.as_ref()));
                return self.fail(&job.id, message);
            }
        };

        let detail = build_detail(job, url, posting, Utc::now());
        let persisted =
            lock_store(&self.store).and_then(|mut store| store.complete_with_detail(&detail));

        match persisted {
            Ok(()) => {
                tracing::debug!("Job {} completed", job.id);
                JobOutcome::Completed
            }
            Err(e) => self.fail(&job.id, format!("storage error: {}", e)),
        }
    }

    fn record(&self, id: &str, outcome: &JobOutcome) {
        let event = match outcome {
            JobOutcome::Completed => {
                self.tally.completed.fetch_add(1, Ordering::Relaxed);
                Some(PipelineEvent::new(EventKind::JobCompleted).with_records(1))
            }
            JobOutcome::Failed(reason) => {
                self.tally.failed.fetch_add(1, Ordering::Relaxed);
                Some(PipelineEvent::new(EventKind::JobFailed).failed(reason.clone()))
            }
            JobOutcome::Aborted => {
                tracing::debug!("Job {} aborted, left pending", id);
                None
            }
        };

        let Some(event) = event else { return };
        emit_best_effort(self.events.as_ref(), event.with_job(id));

        let processed = self.tally.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % self.progress_every == 0 {
            emit_best_effort(
                self.events.as_ref(),
                PipelineEvent::new(EventKind::ExtractionProgress).with_records(processed),
            );
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn process_job<S: RecordStore + 'static>(
    ctx: &WorkerContext<S>,
    job: &IdentifierRecord,
) -> JobOutcome {
    let url = detail_url_for(&ctx.detail_url, &job.id);
    let policy = ctx.policy_for_job();

    match fetch_with_retry(&ctx.client, &url, &policy).await {
        Ok(payload) => ctx.complete(job, &url, &payload),
        Err(FetchFailure::Aborted) => JobOutcome::Aborted,
        Err(failure) => ctx.fail(&job.id, failure.to_string()),
    }
}

async fn run_worker<S: RecordStore + 'static>(worker_id: usize, ctx: WorkerContext<S>) {
    tracing::debug!("Worker {} started", worker_id);

    loop {
        if ctx.breaker.is_stopped() {
            tracing::info!("Worker {} stopping: stop signal set", worker_id);
            break;
        }

        let Some(job) = ctx.next_job() else {
            break;
        };
        let outcome = process_job(&ctx, &job).await;
        ctx.record(&job.id, &outcome);
    }

    tracing::debug!("Worker {} finished", worker_id);
}

/// A bounded pool of extraction workers
pub struct ExtractionPool<S: RecordStore + 'static> {
    client: Client,
    detail_url: String,
    origin: Option<String>,
    workers: usize,
    max_attempts: u32,
    base_delay: Duration,
    progress_every: u64,
    scope: BreakerScope,
    store: SharedStore<S>,
    parser: Arc<dyn DetailParser>,
    events: Arc<dyn EventSink>,
    breaker: Arc<CircuitBreaker>,
}

impl<S: RecordStore + 'static> ExtractionPool<S> {
    /// Creates an extraction pool from configuration
    ///
    /// Only pending jobs tagged with the configured location are processed;
    /// see [`ExtractionPool::with_origin`].
    pub fn new(
        config: &Config,
        client: Client,
        store: SharedStore<S>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, TrawlError> {
        let settings = &config.extraction;

        Ok(Self {
            client,
            detail_url: config.target.detail_url.clone(),
            origin: Some(config.target.location.clone()),
            workers: settings.workers.max(1),
            max_attempts: settings.max_retries,
            base_delay: settings.retry_delay(),
            progress_every: settings.progress_every.max(1),
            scope: settings.breaker_scope,
            store,
            parser: Arc::new(HtmlDetailParser::new()?),
            events,
            breaker: Arc::new(CircuitBreaker::new(config.thresholds)),
        })
    }

    /// Restricts the queue to one origin tag, or takes every pending job with `None`
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn DetailParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces the pool breaker, e.g. to share a stop signal with the caller
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Processes every pending job, or until the stop signal is set
    ///
    /// Per-job failures are recorded on the job; only storage failures while
    /// loading the queue return an error.
    pub async fn run(&self) -> Result<ExtractionReport, TrawlError> {
        let started = Instant::now();

        let (orphans_reset, pending) = {
            let mut store = lock_store(&self.store)?;
            let orphans = store.reset_orphaned_completions()?;
            let pending = store.list_pending(self.origin.as_deref())?;
            (orphans as u64, pending)
        };

        if orphans_reset > 0 {
            tracing::warn!(
                "Reset {} completed jobs without detail records to pending",
                orphans_reset
            );
        }

        let queued = pending.len() as u64;
        let workers = self.workers.min(pending.len()).max(1);
        tracing::info!(
            "Starting extraction of {} pending jobs with {} workers",
            queued,
            workers
        );
        emit_best_effort(
            self.events.as_ref(),
            PipelineEvent::new(EventKind::ExtractionStarted).with_records(queued),
        );

        let tally = Arc::new(Tally::default());
        let ctx = WorkerContext {
            client: self.client.clone(),
            detail_url: Arc::from(self.detail_url.as_str()),
            store: Arc::clone(&self.store),
            parser: Arc::clone(&self.parser),
            events: Arc::clone(&self.events),
            breaker: Arc::clone(&self.breaker),
            scope: self.scope,
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            progress_every: self.progress_every,
            queue: Arc::new(Mutex::new(VecDeque::from(pending))),
            tally: Arc::clone(&tally),
        };

        let mut tasks = JoinSet::new();
        if queued > 0 {
            for worker_id in 0..workers {
                tasks.spawn(run_worker(worker_id, ctx.clone()));
            }
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Extraction worker failed: {}", e);
            }
        }

        let completed = tally.completed.load(Ordering::Relaxed);
        let failed = tally.failed.load(Ordering::Relaxed);
        let tripped_by = self.breaker.tripped_by();
        let report = ExtractionReport {
            queued,
            completed,
            failed,
            left_pending: queued.saturating_sub(completed + failed),
            orphans_reset,
            tripped_by,
            elapsed: started.elapsed(),
        };

        if let Some(class) = tripped_by {
            emit_best_effort(
                self.events.as_ref(),
                PipelineEvent::new(EventKind::CircuitTripped(Phase::Extraction))
                    .with_records(report.left_pending)
                    .failed(format!("{} threshold reached", class.as_str())),
            );
        }

        let status = if report.left_pending > 0 {
            EventStatus::Partial
        } else {
            EventStatus::Success
        };
        emit_best_effort(
            self.events.as_ref(),
            PipelineEvent::new(EventKind::ExtractionCompleted)
                .with_records(completed)
                .with_status(status)
                .with_elapsed(report.elapsed),
        );

        tracing::info!(
            "Extraction finished: {} completed, {} failed, {} left pending",
            report.completed,
            report.failed,
            report.left_pending
        );

        Ok(report)
    }
}
