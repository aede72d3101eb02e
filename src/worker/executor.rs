use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorConfig;
use crate::error::{NodeError, Result};
use crate::worker::launcher::{JobLauncher, LaunchResult, LaunchSpec};

/// Runs jobs as local shell processes.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// The shell line for a job: the command executable followed by the
    /// request arguments. An empty executable runs the arguments as is.
    pub fn command_line(spec: &LaunchSpec) -> String {
        std::iter::once(spec.command.executable.as_str())
            .chain(spec.request.command_args.iter().map(String::as_str))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Environment exported to every job process.
    pub fn environment(spec: &LaunchSpec) -> Vec<(&'static str, String)> {
        vec![
            ("JOBNODE_JOB_ID", spec.job_id.clone()),
            ("JOBNODE_JOB_NAME", spec.request.name.clone()),
            ("JOBNODE_USER", spec.request.user.clone()),
            ("JOBNODE_CLUSTER_ID", spec.cluster.id.clone()),
            ("JOBNODE_CLUSTER_NAME", spec.cluster.name.clone()),
            ("JOBNODE_COMMAND_ID", spec.command.id.clone()),
            ("JOBNODE_COMMAND_NAME", spec.command.name.clone()),
            (
                "JOBNODE_APPLICATION_IDS",
                spec.applications
                    .iter()
                    .map(|a| a.id.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ("JOBNODE_JOB_MEMORY_MB", spec.memory_mb.to_string()),
        ]
    }

    fn process_output(
        job_id: &str,
        result: std::result::Result<std::process::Output, std::io::Error>,
    ) -> Result<LaunchResult> {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Job process could not be started");
                return Err(NodeError::Launch(format!("job {}: {}", job_id, e)));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        let error = if output.status.success() {
            None
        } else if stderr.is_empty() {
            Some(format!("Exit code: {:?}", exit_code))
        } else {
            Some(stderr)
        };

        tracing::info!(job_id, exit_code = ?exit_code, "Job process exited");

        Ok(LaunchResult {
            exit_code,
            output: if stdout.is_empty() { None } else { Some(stdout) },
            error,
        })
    }
}

#[async_trait]
impl JobLauncher for JobExecutor {
    async fn launch(&self, spec: LaunchSpec, _cancel: CancellationToken) -> Result<LaunchResult> {
        let line = Self::command_line(&spec);
        tracing::info!(job_id = %spec.job_id, command = %line, "Launching job");

        let mut command = Command::new(&self.config.shell);
        command
            .arg("-c")
            .arg(&line)
            .envs(Self::environment(&spec))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.config.working_dir {
            command.current_dir(dir);
        }

        let result = command.output().await;
        Self::process_output(&spec.job_id, result)
    }
}
