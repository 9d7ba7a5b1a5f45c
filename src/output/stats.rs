//! Statistics generation from the record store
//!
//! This module provides functionality for extracting and displaying
//! queue statistics from the storage layer.

use crate::state::JobStatus;
use crate::storage::RecordStore;
use crate::TrawlError;
use std::collections::HashMap;

/// Queue statistics summary
#[derive(Debug, Clone)]
pub struct QueueStatistics {
    /// Total number of identifiers ever discovered
    pub total_jobs: u64,

    /// Count of identifiers by status
    pub jobs_by_status: HashMap<JobStatus, u64>,

    /// Number of stored detail records
    pub details: u64,
}

impl QueueStatistics {
    pub fn count(&self, status: JobStatus) -> u64 {
        self.jobs_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of finished jobs that completed, as a percentage
    pub fn success_rate(&self) -> f64 {
        let completed = self.count(JobStatus::Completed);
        let finished = completed + self.count(JobStatus::Failed);
        if finished > 0 {
            (completed as f64 / finished as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The record store to query
///
/// # Returns
///
/// * `Ok(QueueStatistics)` - Successfully loaded statistics
/// * `Err(TrawlError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn RecordStore) -> Result<QueueStatistics, TrawlError> {
    let mut jobs_by_status = HashMap::new();
    for status in JobStatus::all() {
        jobs_by_status.insert(status, storage.count_by_status(status)?);
    }

    Ok(QueueStatistics {
        total_jobs: jobs_by_status.values().sum(),
        jobs_by_status,
        details: storage.count_details()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &QueueStatistics) {
    println!("=== Queue Statistics ===\n");

    println!("Overview:");
    println!("  Total jobs discovered: {}", stats.total_jobs);
    println!("  Detail records: {}", stats.details);
    println!();

    println!("Jobs by Status:");
    for status in JobStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total_jobs > 0 {
            (count as f64 / stats.total_jobs as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} of {} finished jobs completed)",
        stats.success_rate(),
        stats.count(JobStatus::Completed),
        stats.count(JobStatus::Completed) + stats.count(JobStatus::Failed)
    );
}
