//! Job persistence.
//!
//! [`JobStore`] is the system of record for job status and kill endpoints.
//! [`MemoryJobStore`] keeps everything in process and is what a single node
//! runs with when no external store is wired in.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{NodeError, Result};
use crate::scheduler::{Job, JobStatus, KillEndpoint};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn exists(&self, job_id: &str) -> Result<bool>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// Insert a new job. Fails with `Conflict` if the id is taken.
    async fn save(&self, job: Job) -> Result<()>;

    /// Move a job to RUNNING and publish where kill signals go.
    async fn mark_running(&self, job_id: &str, kill_endpoint: KillEndpoint) -> Result<()>;

    /// Move a job to a terminal status.
    async fn mark_finished(&self, job_id: &str, status: JobStatus, exit_code: Option<i32>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All jobs sorted by creation time.
    pub async fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by_key(|j| j.created_at);
        all
    }

    /// Overwrite a job unconditionally. Meant for seeding state in tests.
    pub async fn put(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    fn transition(job: &mut Job, next: JobStatus) -> Result<()> {
        if !job.status.can_transition_to(next) {
            return Err(NodeError::InvalidTransition {
                job_id: job.id.clone(),
                from: job.status,
                to: next,
            });
        }
        job.status = next;
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn exists(&self, job_id: &str) -> Result<bool> {
        Ok(self.jobs.read().await.contains_key(job_id))
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn save(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(NodeError::Conflict(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn mark_running(&self, job_id: &str, kill_endpoint: KillEndpoint) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| NodeError::NotFound(job_id.to_string()))?;
        Self::transition(job, JobStatus::Running)?;
        job.kill_endpoint = Some(kill_endpoint);
        job.started_at = Some(Utc::now());
        tracing::debug!(job_id, "Job running");
        Ok(())
    }

    async fn mark_finished(&self, job_id: &str, status: JobStatus, exit_code: Option<i32>) -> Result<()> {
        if !status.is_terminal() {
            return Err(NodeError::Precondition(format!(
                "{} is not a terminal status",
                status
            )));
        }
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| NodeError::NotFound(job_id.to_string()))?;
        Self::transition(job, status)?;
        job.exit_code = exit_code;
        job.finished_at = Some(Utc::now());
        tracing::debug!(job_id, status = %status, "Job finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::JobRequest;

    fn job(id: &str) -> Job {
        Job::new(JobRequest::new("test", "tester").with_id(id))
    }

    #[tokio::test]
    async fn save_rejects_duplicates() {
        let store = MemoryJobStore::new();
        store.save(job("a")).await.unwrap();
        assert!(store.exists("a").await.unwrap());
        assert!(matches!(store.save(job("a")).await, Err(NodeError::Conflict(_))));
    }

    #[tokio::test]
    async fn lifecycle_sets_endpoint_and_timestamps() {
        let store = MemoryJobStore::new();
        store.save(job("a")).await.unwrap();

        store.mark_running("a", KillEndpoint::new("n1", "a")).await.unwrap();
        let running = store.get("a").await.unwrap().unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert_eq!(running.kill_endpoint, Some(KillEndpoint::new("n1", "a")));
        assert!(running.started_at.is_some());

        store.mark_finished("a", JobStatus::Succeeded, Some(0)).await.unwrap();
        let done = store.get("a").await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.exit_code, Some(0));
        assert!(done.finished_at.is_some());
    }

    #[tokio::test]
    async fn status_never_moves_backwards() {
        let store = MemoryJobStore::new();
        store.save(job("a")).await.unwrap();
        store.mark_finished("a", JobStatus::Killed, None).await.unwrap();

        let err = store.mark_running("a", KillEndpoint::new("n1", "a")).await;
        assert!(matches!(err, Err(NodeError::InvalidTransition { .. })));
        let err = store.mark_finished("a", JobStatus::Failed, None).await;
        assert!(matches!(err, Err(NodeError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn updates_on_unknown_job_are_not_found() {
        let store = MemoryJobStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(matches!(
            store.mark_running("nope", KillEndpoint::new("n1", "nope")).await,
            Err(NodeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mark_finished_requires_terminal_status() {
        let store = MemoryJobStore::new();
        store.save(job("a")).await.unwrap();
        assert!(matches!(
            store.mark_finished("a", JobStatus::Running, None).await,
            Err(NodeError::Precondition(_))
        ));
    }
}
