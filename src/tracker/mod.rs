//! Node-local bookkeeping of scheduled and running jobs.
//!
//! - [`JobTracker`]: table of tracked jobs with init/schedule/done and
//!   aggregate queries
//! - [`JobTask`]: cancellable handle to a job body running on the runtime
//! - [`ScheduleObserver`]: synchronous hook fired when a job is scheduled
//! - [`TrackerMetrics`]: Prometheus gauges read from the table at scrape time
//!
//! Per job the lifecycle is `absent -> initialised -> scheduled -> absent`.

pub mod metrics;
pub mod observer;
pub mod task;
#[allow(clippy::module_inception)]
pub mod tracker;

pub use metrics::{SnapshotSource, TrackerMetrics, TrackerSnapshot};
pub use observer::{JobScheduled, ScheduleObserver};
pub use task::{CancelOutcome, JobTask, TaskState};
pub use tracker::JobTracker;
