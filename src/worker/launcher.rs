use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::scheduler::{Application, Cluster, Command, JobRequest};

/// Everything needed to start one job on this node.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub job_id: String,
    pub request: JobRequest,
    pub cluster: Cluster,
    pub command: Command,
    pub applications: Vec<Application>,
    pub memory_mb: u64,
}

/// Result of running a job body to completion.
#[derive(Debug, Clone, Default)]
pub struct LaunchResult {
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl LaunchResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The body of a scheduled job.
///
/// The future returned by `launch` may be dropped at any await point once
/// `cancel` fires; implementations that own OS resources must release them
/// on drop.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, spec: LaunchSpec, cancel: CancellationToken) -> Result<LaunchResult>;
}
