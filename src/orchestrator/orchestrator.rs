use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{NodeError, Result};
use crate::scheduler::{JobRequest, JobStatus, KillEndpoint};
use crate::store::JobStore;

/// Turns an accepted request into a scheduled job.
#[async_trait]
pub trait SubmissionPipeline: Send + Sync {
    async fn submit(&self, request: JobRequest) -> Result<()>;
}

/// Delivers kill signals to wherever a job is running.
#[async_trait]
pub trait CancellationChannel: Send + Sync {
    /// Signal the job behind `endpoint` to stop. Signalling a job that has
    /// already finished succeeds without effect.
    async fn send_kill(&self, endpoint: &KillEndpoint) -> Result<()>;
}

/// Entry point for job submission and kill requests.
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    pipeline: Arc<dyn SubmissionPipeline>,
    channel: Arc<dyn CancellationChannel>,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: Arc<dyn SubmissionPipeline>,
        channel: Arc<dyn CancellationChannel>,
    ) -> Self {
        Self {
            store,
            pipeline,
            channel,
        }
    }

    /// Submit a job and return its id once the pipeline accepted it.
    ///
    /// Does not wait for the job to run.
    pub async fn submit_job(&self, request: JobRequest) -> Result<String> {
        let job_id = request.id.clone();
        if self.store.exists(&job_id).await? {
            return Err(NodeError::Conflict(format!(
                "A job with id {} already exists",
                job_id
            )));
        }

        self.pipeline.submit(request).await?;
        tracing::info!(job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    /// Request that a job be killed.
    ///
    /// # Errors
    ///
    /// Checked in order, the first failure wins:
    /// - `NotFound` if the store has no such job
    /// - `Precondition` if the job is still in INIT
    /// - `Precondition` if the job has no kill endpoint
    pub async fn kill_job(&self, job_id: &str) -> Result<()> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| NodeError::NotFound(format!("No job with id {} exists", job_id)))?;

        if job.status == JobStatus::Init {
            return Err(NodeError::Precondition(format!(
                "Job {} is still initializing and can't be killed yet",
                job_id
            )));
        }

        let endpoint = job.kill_endpoint.ok_or_else(|| {
            NodeError::Precondition(format!("Job {} has no kill endpoint", job_id))
        })?;

        if job.status.is_terminal() {
            tracing::debug!(job_id, status = %job.status, "Kill requested for finished job");
        }
        self.channel.send_kill(&endpoint).await?;
        tracing::info!(job_id, endpoint = %endpoint, "Kill signal sent");
        Ok(())
    }
}
