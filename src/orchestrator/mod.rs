//! Job submission and kill coordination.
//!
//! - [`JobOrchestrator`]: duplicate check on submit, precondition checks on kill
//! - [`LocalSubmissionPipeline`]: plans a job and schedules it on the tracker
//! - [`JobMonitor`]: follows scheduled jobs to completion and delivers kills

pub mod monitor;
#[allow(clippy::module_inception)]
pub mod orchestrator;
pub mod pipeline;

pub use monitor::JobMonitor;
pub use orchestrator::{CancellationChannel, JobOrchestrator, SubmissionPipeline};
pub use pipeline::LocalSubmissionPipeline;
