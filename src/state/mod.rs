//! State module for tracking job lifecycle
//!
//! # Components
//!
//! - `JobStatus`: Lifecycle of a discovered identifier (pending, completed, failed)
//! - `DetailStatus`: Status stamped on an extracted detail record

mod job_status;

pub use job_status::{DetailStatus, JobStatus};
