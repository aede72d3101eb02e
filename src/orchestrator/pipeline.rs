use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::orchestrator::orchestrator::SubmissionPipeline;
use crate::scheduler::{Cluster, ClusterSelector, Command, Job, JobRequest};
use crate::store::JobStore;
use crate::tracker::JobTracker;

/// Plans and schedules submitted jobs on this node.
///
/// For each request: resolve candidate clusters and a command from tags,
/// select a cluster, check memory, persist the job in INIT, then hand it to
/// the tracker.
pub struct LocalSubmissionPipeline {
    config: NodeConfig,
    store: Arc<dyn JobStore>,
    tracker: Arc<JobTracker>,
    selector: Arc<dyn ClusterSelector>,
    /// Serialises the memory check with the tracker reservation.
    admission: Mutex<()>,
}

impl LocalSubmissionPipeline {
    pub fn new(
        config: NodeConfig,
        store: Arc<dyn JobStore>,
        tracker: Arc<JobTracker>,
        selector: Arc<dyn ClusterSelector>,
    ) -> Self {
        Self {
            config,
            store,
            tracker,
            selector,
            admission: Mutex::new(()),
        }
    }

    /// Clusters carrying every tag the request asks for.
    pub fn candidate_clusters(&self, request: &JobRequest) -> Vec<Cluster> {
        self.config
            .clusters
            .iter()
            .filter(|c| request.cluster_tags.is_subset(&c.tags))
            .cloned()
            .collect()
    }

    /// First configured command carrying every requested command tag.
    pub fn resolve_command(&self, request: &JobRequest) -> Result<Command> {
        self.config
            .commands
            .iter()
            .find(|c| request.command_tags.is_subset(&c.tags))
            .cloned()
            .ok_or_else(|| {
                NodeError::Precondition(format!(
                    "No command matches tags {:?} for job {}",
                    request.command_tags, request.id
                ))
            })
    }

    fn job_memory(&self, request: &JobRequest) -> Result<u64> {
        let memory = request
            .memory_mb
            .unwrap_or(self.config.memory.default_job_memory_mb);
        if memory == 0 || memory > self.config.memory.max_job_memory_mb {
            return Err(NodeError::Precondition(format!(
                "Requested memory {}MB is outside 1..={}MB",
                memory, self.config.memory.max_job_memory_mb
            )));
        }
        Ok(memory)
    }
}

#[async_trait]
impl SubmissionPipeline for LocalSubmissionPipeline {
    async fn submit(&self, request: JobRequest) -> Result<()> {
        let memory_mb = self.job_memory(&request)?;
        let command = self.resolve_command(&request)?;
        let candidates = self.candidate_clusters(&request);
        let cluster = self.selector.select_cluster(Some(candidates.as_slice()))?;

        let _admission = self.admission.lock().await;

        let used = self.tracker.used_memory();
        let max = self.config.memory.max_system_memory_mb;
        if used + memory_mb > max {
            tracing::warn!(job_id = %request.id, used, requested = memory_mb, max, "Not enough memory for job");
            return Err(NodeError::Unavailable(format!(
                "Job {} needs {}MB but only {}MB of {}MB is free",
                request.id,
                memory_mb,
                max.saturating_sub(used),
                max
            )));
        }

        let mut job = Job::new(request.clone());
        job.cluster_id = Some(cluster.id.clone());
        job.command_id = Some(command.id.clone());
        job.memory_mb = memory_mb;
        self.store.save(job).await?;

        let applications = command.applications.clone();
        self.tracker.init(&request.id);
        self.tracker.schedule(
            &request.id,
            &request,
            &cluster,
            &command,
            &applications,
            memory_mb,
        );
        Ok(())
    }
}
