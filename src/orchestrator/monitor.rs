use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::error::{NodeError, Result};
use crate::orchestrator::orchestrator::CancellationChannel;
use crate::scheduler::{JobStatus, KillEndpoint};
use crate::store::JobStore;
use crate::tracker::{JobScheduled, JobTask, JobTracker, ScheduleObserver, TaskState};

type TaskIndex = Arc<Mutex<HashMap<String, JobTask>>>;

/// Follows jobs scheduled on this node from start to finish.
///
/// As a [`ScheduleObserver`] it indexes every scheduled task, marks the job
/// RUNNING with a kill endpoint pointing here, records the final status once
/// the task ends, and releases the job from the tracker. As a
/// [`CancellationChannel`] it delivers kill signals to indexed tasks.
pub struct JobMonitor {
    node_name: String,
    store: Arc<dyn JobStore>,
    tracker: Weak<JobTracker>,
    runtime: Handle,
    tasks: TaskIndex,
}

impl JobMonitor {
    pub fn new(
        node_name: impl Into<String>,
        store: Arc<dyn JobStore>,
        tracker: Weak<JobTracker>,
        runtime: Handle,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            store,
            tracker,
            runtime,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Ids of jobs whose tasks have not finished yet.
    pub fn running_jobs(&self) -> Vec<String> {
        self.tasks
            .lock()
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn final_status(state: TaskState) -> (JobStatus, Option<i32>) {
        match state {
            TaskState::Succeeded { exit_code } => (JobStatus::Succeeded, exit_code),
            TaskState::Failed { exit_code } => (JobStatus::Failed, exit_code),
            TaskState::Cancelled => (JobStatus::Killed, None),
            // wait() only returns finished states
            TaskState::Running => (JobStatus::Failed, None),
        }
    }
}

impl ScheduleObserver for JobMonitor {
    fn on_job_scheduled(&self, event: &JobScheduled) {
        self.tasks
            .lock()
            .insert(event.job_id.clone(), event.task.clone());

        let job_id = event.job_id.clone();
        let task = event.task.clone();
        let endpoint = KillEndpoint::new(self.node_name.clone(), job_id.clone());
        let store = self.store.clone();
        let tracker = self.tracker.clone();
        let tasks = self.tasks.clone();

        self.runtime.spawn(async move {
            if let Err(e) = store.mark_running(&job_id, endpoint).await {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to mark job running");
            }

            let (status, exit_code) = Self::final_status(task.wait().await);
            if let Err(e) = store.mark_finished(&job_id, status, exit_code).await {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to record job completion");
            }
            tracing::info!(job_id = %job_id, status = %status, exit_code = ?exit_code, "Job finished");

            tasks.lock().remove(&job_id);
            if let Some(tracker) = tracker.upgrade() {
                tracker.done(&job_id);
            }
        });
    }
}

#[async_trait]
impl CancellationChannel for JobMonitor {
    async fn send_kill(&self, endpoint: &KillEndpoint) -> Result<()> {
        if endpoint.node != self.node_name {
            return Err(NodeError::Precondition(format!(
                "Kill endpoint {} is not on node {}",
                endpoint, self.node_name
            )));
        }

        let task = self.tasks.lock().get(&endpoint.job_id).cloned();
        match task {
            Some(task) => {
                let outcome = task.cancel();
                tracing::info!(job_id = %endpoint.job_id, outcome = ?outcome, "Kill delivered");
            }
            None => {
                tracing::debug!(job_id = %endpoint.job_id, "No running task to kill");
            }
        }
        Ok(())
    }
}
