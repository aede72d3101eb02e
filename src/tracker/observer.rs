use crate::tracker::task::JobTask;

/// Published by [`JobTracker::schedule`](crate::tracker::JobTracker::schedule)
/// once the job's task is stored in the tracking table.
#[derive(Debug, Clone)]
pub struct JobScheduled {
    pub job_id: String,
    pub task: JobTask,
    pub memory_mb: u64,
}

/// Synchronous listener for scheduling events.
///
/// Called on the scheduling thread before `schedule` returns, so
/// implementations must not block.
pub trait ScheduleObserver: Send + Sync {
    fn on_job_scheduled(&self, event: &JobScheduled);
}
