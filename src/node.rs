use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use tokio::runtime::Handle;

use crate::config::NodeConfig;
use crate::error::Result;
use crate::orchestrator::{JobMonitor, JobOrchestrator, LocalSubmissionPipeline};
use crate::scheduler::{ClusterSelector, Job, RandomClusterSelector};
use crate::store::{JobStore, MemoryJobStore};
use crate::tracker::JobTracker;
use crate::worker::{JobExecutor, JobLauncher};

/// A job-execution node with all of its components wired together.
pub struct Node {
    pub config: NodeConfig,
    pub store: Arc<MemoryJobStore>,
    pub tracker: Arc<JobTracker>,
    pub monitor: Arc<JobMonitor>,
    pub orchestrator: JobOrchestrator,
    pub registry: Registry,
}

impl Node {
    /// Build a node that runs jobs as local shell processes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let launcher = Arc::new(JobExecutor::new(config.executor.clone()));
        Self::with_launcher(config, launcher, Arc::new(RandomClusterSelector::new()))
    }

    /// Build a node around a custom job body and cluster selection strategy.
    pub fn with_launcher(
        config: NodeConfig,
        launcher: Arc<dyn JobLauncher>,
        selector: Arc<dyn ClusterSelector>,
    ) -> Result<Self> {
        let runtime = Handle::current();
        let registry = Registry::new();

        let store = Arc::new(MemoryJobStore::new());
        let store_dyn: Arc<dyn JobStore> = store.clone();

        let tracker = Arc::new(JobTracker::new(launcher, runtime.clone(), &registry)?);
        let monitor = Arc::new(JobMonitor::new(
            config.node_name.clone(),
            store_dyn.clone(),
            Arc::downgrade(&tracker),
            runtime,
        ));
        tracker.register_observer(monitor.clone());

        let pipeline = Arc::new(LocalSubmissionPipeline::new(
            config.clone(),
            store_dyn.clone(),
            tracker.clone(),
            selector,
        ));
        let orchestrator = JobOrchestrator::new(store_dyn, pipeline, monitor.clone());

        tracing::info!(
            node = %config.node_name,
            max_memory_mb = config.memory.max_system_memory_mb,
            clusters = config.clusters.len(),
            commands = config.commands.len(),
            "Node ready"
        );

        Ok(Self {
            config,
            store,
            tracker,
            monitor,
            orchestrator,
            registry,
        })
    }

    /// Poll the store until `job_id` reaches a terminal status.
    ///
    /// Returns `None` if the job does not exist.
    pub async fn wait_for_job(&self, job_id: &str, poll: Duration) -> Result<Option<Job>> {
        let mut interval = tokio::time::interval(poll);
        loop {
            interval.tick().await;
            match self.store.get(job_id).await? {
                Some(job) if job.status.is_terminal() => return Ok(Some(job)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    /// Kill every job still running on this node.
    ///
    /// Jobs that can't be killed yet (still in INIT) are logged and skipped.
    pub async fn kill_all(&self) -> usize {
        let mut killed = 0;
        for job_id in self.monitor.running_jobs() {
            match self.orchestrator.kill_job(&job_id).await {
                Ok(()) => killed += 1,
                Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Failed to kill job"),
            }
        }
        killed
    }
}
