//! Output module for run reports and queue statistics
//!
//! This module handles:
//! - Printing discovery and extraction run reports
//! - Loading and printing queue statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, QueueStatistics};

use crate::crawler::{DiscoveryReport, ExtractionReport, StopReason};

/// Prints a discovery run report to stdout
pub fn print_discovery_report(report: &DiscoveryReport) {
    println!("=== Discovery ===");
    println!("  Pages fetched: {}", report.pages);
    println!(
        "  Identifiers found: {} ({} new)",
        report.ids_found, report.ids_inserted
    );
    println!("  Final offset: {}", report.final_offset);
    match &report.stop_reason {
        StopReason::Exhausted => println!("  Stopped: listing exhausted"),
        StopReason::FetchFailed(failure) => println!("  Stopped: {}", failure),
    }
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

/// Prints an extraction run report to stdout
pub fn print_extraction_report(report: &ExtractionReport) {
    println!("=== Extraction ===");
    println!("  Jobs queued: {}", report.queued);
    println!("  Completed: {}", report.completed);
    println!("  Failed: {}", report.failed);
    println!("  Left pending: {}", report.left_pending);
    if report.orphans_reset > 0 {
        println!("  Orphaned completions reset: {}", report.orphans_reset);
    }
    if let Some(class) = report.tripped_by {
        println!("  Circuit tripped: {}", class.as_str());
    }
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!();
}
