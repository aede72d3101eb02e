use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use prometheus::Registry;
use tokio::runtime::Handle;

use crate::error::Result;
use crate::scheduler::{Application, Cluster, Command, JobRequest};
use crate::tracker::metrics::{SnapshotSource, TrackerMetrics, TrackerSnapshot};
use crate::tracker::observer::{JobScheduled, ScheduleObserver};
use crate::tracker::task::{CancelOutcome, JobTask};
use crate::worker::{JobLauncher, LaunchSpec};

/// Bookkeeping entry for one job on this node.
#[derive(Debug, Default)]
struct TrackedJob {
    task: Option<JobTask>,
    memory_mb: u64,
    active: bool,
    /// Set by `done` before the entry leaves the table. Holders of a stale
    /// `Arc` must treat a retired entry as absent.
    retired: bool,
}

type Entry = Arc<Mutex<TrackedJob>>;

/// The tracking table, shared with the metrics collector.
#[derive(Debug, Default)]
struct JobTable(RwLock<HashMap<String, Entry>>);

impl JobTable {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.0.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.0.write()
    }
}

impl SnapshotSource for JobTable {
    fn snapshot(&self) -> TrackerSnapshot {
        let jobs = self.read();
        let mut snapshot = TrackerSnapshot::default();
        for entry in jobs.values() {
            let job = entry.lock();
            if job.retired {
                continue;
            }
            snapshot.tracked += 1;
            snapshot.memory_mb += job.memory_mb;
            if job.active {
                snapshot.active += 1;
            }
        }
        snapshot
    }
}

/// Tracks the jobs scheduled or running on this node.
///
/// Mutation of one job only locks that job's entry; the table lock is held
/// just long enough to insert, look up or remove an entry. No path takes the
/// table lock while holding an entry lock.
pub struct JobTracker {
    jobs: Arc<JobTable>,
    observers: RwLock<Vec<Arc<dyn ScheduleObserver>>>,
    launcher: Arc<dyn JobLauncher>,
    runtime: Handle,
    metrics: TrackerMetrics,
}

impl JobTracker {
    /// Create an empty tracker whose metrics are registered with `registry`.
    pub fn new(launcher: Arc<dyn JobLauncher>, runtime: Handle, registry: &Registry) -> Result<Self> {
        let jobs = Arc::new(JobTable::default());
        let metrics = TrackerMetrics::new(registry, jobs.clone())?;
        Ok(Self {
            jobs,
            observers: RwLock::new(Vec::new()),
            launcher,
            runtime,
            metrics,
        })
    }

    pub fn register_observer(&self, observer: Arc<dyn ScheduleObserver>) {
        self.observers.write().push(observer);
    }

    pub fn metrics(&self) -> &TrackerMetrics {
        &self.metrics
    }

    /// Start tracking `job_id`. The first call wins; later calls are no-ops.
    pub fn init(&self, job_id: &str) {
        {
            let mut jobs = self.jobs.write();
            if jobs.contains_key(job_id) {
                return;
            }
            jobs.insert(job_id.to_string(), Entry::default());
        }
        tracing::debug!(job_id, "Job tracking initialised");
    }

    /// Launch the job on the worker pool and record its task and memory.
    ///
    /// Does nothing unless `init` was called for `job_id` first. Observers
    /// are notified before this returns.
    pub fn schedule(
        &self,
        job_id: &str,
        request: &JobRequest,
        cluster: &Cluster,
        command: &Command,
        applications: &[Application],
        memory_mb: u64,
    ) {
        if !self.job_exists(job_id) {
            // TODO: decide whether a schedule without init should be an error once
            // the submission path guarantees ordering.
            tracing::debug!(job_id, "Job not initialised, ignoring schedule");
            return;
        }

        let spec = LaunchSpec {
            job_id: job_id.to_string(),
            request: request.clone(),
            cluster: cluster.clone(),
            command: command.clone(),
            applications: applications.to_vec(),
            memory_mb,
        };
        let launcher = self.launcher.clone();
        let task = JobTask::spawn(&self.runtime, job_id, move |cancel| async move {
            launcher.launch(spec, cancel).await
        });

        if !self.set_memory_and_task(job_id, memory_mb, task.clone()) {
            // done() got here first
            task.cancel();
            tracing::debug!(job_id, "Job removed while scheduling, task cancelled");
            return;
        }

        tracing::info!(job_id, cluster_id = %cluster.id, memory_mb, "Job scheduled");

        let event = JobScheduled {
            job_id: job_id.to_string(),
            task,
            memory_mb,
        };
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_job_scheduled(&event);
        }
    }

    /// Stop tracking `job_id`, cancelling its task if it is still running.
    ///
    /// Idempotent. The entry is removed even when cancellation fails.
    pub fn done(&self, job_id: &str) {
        let Some(entry) = self.jobs.read().get(job_id).cloned() else {
            return;
        };

        {
            let mut job = entry.lock();
            if job.retired {
                return;
            }
            job.retired = true;
            job.active = false;
            if let Some(task) = job.task.take() {
                if !task.is_finished() {
                    record_cancel(&self.metrics, job_id, task.cancel());
                }
            }
        }

        {
            let mut jobs = self.jobs.write();
            if jobs.get(job_id).is_some_and(|current| Arc::ptr_eq(current, &entry)) {
                jobs.remove(job_id);
            }
        }
        tracing::debug!(job_id, "Job tracking done");
    }

    pub fn job_exists(&self, job_id: &str) -> bool {
        self.jobs.read().contains_key(job_id)
    }

    pub fn num_tracked_jobs(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn num_active_jobs(&self) -> usize {
        self.jobs.snapshot().active
    }

    /// Memory reserved by every tracked job, scheduled or not.
    pub fn used_memory(&self) -> u64 {
        self.jobs.snapshot().memory_mb
    }

    /// Task handle for `job_id` if it has been scheduled.
    pub fn task(&self, job_id: &str) -> Option<JobTask> {
        self.with_job(job_id, |job| job.task.clone()).flatten()
    }

    fn set_memory_and_task(&self, job_id: &str, memory_mb: u64, task: JobTask) -> bool {
        self.with_job(job_id, |job| {
            if job.task.is_some() {
                tracing::warn!(job_id, "Job scheduled twice, replacing task handle");
            }
            job.memory_mb = memory_mb;
            job.task = Some(task);
            job.active = true;
        })
        .is_some()
    }

    /// Run `f` under the entry lock of `job_id`, if the entry is still live.
    fn with_job<T>(&self, job_id: &str, f: impl FnOnce(&mut TrackedJob) -> T) -> Option<T> {
        let entry = self.jobs.read().get(job_id).cloned()?;
        let mut job = entry.lock();
        if job.retired {
            return None;
        }
        Some(f(&mut job))
    }
}

/// A task that finished between the liveness check and `cancel` could not
/// be cancelled. One cancelled by someone else is already stopping.
fn record_cancel(metrics: &TrackerMetrics, job_id: &str, outcome: CancelOutcome) {
    match outcome {
        CancelOutcome::Cancelled => tracing::debug!(job_id, "Cancelled job task"),
        CancelOutcome::AlreadyCancelled => tracing::debug!(job_id, "Job task already cancelled"),
        CancelOutcome::AlreadyFinished => {
            tracing::error!(job_id, "Unable to cancel job task");
            metrics.record_unable_to_cancel();
        }
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker")
            .field("tracked", &self.num_tracked_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_lost_race_with_completion_counts_as_failed_cancel() {
        let registry = Registry::new();
        let metrics = TrackerMetrics::new(&registry, Arc::new(JobTable::default())).unwrap();

        record_cancel(&metrics, "j1", CancelOutcome::Cancelled);
        record_cancel(&metrics, "j1", CancelOutcome::AlreadyCancelled);
        assert_eq!(metrics.unable_to_cancel(), 0);

        record_cancel(&metrics, "j1", CancelOutcome::AlreadyFinished);
        assert_eq!(metrics.unable_to_cancel(), 1);
    }

    #[test]
    fn snapshot_skips_retired_entries() {
        let table = JobTable::default();
        let live = Entry::default();
        {
            let mut job = live.lock();
            job.memory_mb = 512;
            job.active = true;
        }
        let retired = Entry::default();
        {
            let mut job = retired.lock();
            job.memory_mb = 256;
            job.retired = true;
        }
        table.write().insert("live".to_string(), live);
        table.write().insert("retired".to_string(), retired);

        assert_eq!(
            table.snapshot(),
            TrackerSnapshot {
                tracked: 1,
                active: 1,
                memory_mb: 512,
            }
        );
    }
}
