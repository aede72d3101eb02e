//! Cancellable handle to a job running on the worker pool.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::worker::LaunchResult;

/// Execution state of a scheduled job body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Succeeded { exit_code: Option<i32> },
    Failed { exit_code: Option<i32> },
    Cancelled,
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// What a call to [`JobTask::cancel`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The cancellation signal was delivered to a running job.
    Cancelled,
    /// The job had already finished; nothing to cancel.
    AlreadyFinished,
    /// Someone else cancelled the job first.
    AlreadyCancelled,
}

/// Handle to a spawned job body.
///
/// Cloneable; every clone refers to the same job. Cancellation is
/// cooperative: the body is dropped at its next await point, work that never
/// yields keeps running until it does.
#[derive(Debug, Clone)]
pub struct JobTask {
    job_id: String,
    token: CancellationToken,
    state_rx: watch::Receiver<TaskState>,
}

impl JobTask {
    /// Spawn `body` on `runtime` and return a handle to it.
    pub fn spawn<F, Fut>(runtime: &Handle, job_id: &str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<LaunchResult>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(TaskState::Running);
        let fut = body(token.clone());
        let cancelled = token.clone();
        let id = job_id.to_string();

        runtime.spawn(async move {
            let state = tokio::select! {
                biased;
                _ = cancelled.cancelled() => TaskState::Cancelled,
                result = fut => match result {
                    Ok(result) if result.success() => TaskState::Succeeded { exit_code: result.exit_code },
                    Ok(result) => TaskState::Failed { exit_code: result.exit_code },
                    Err(e) => {
                        tracing::error!(job_id = %id, error = %e, "Job launch failed");
                        TaskState::Failed { exit_code: None }
                    }
                },
            };
            tracing::debug!(job_id = %id, state = ?state, "Job task finished");
            state_tx.send_replace(state);
        });

        Self {
            job_id: job_id.to_string(),
            token,
            state_rx,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current state without waiting.
    ///
    /// A task whose body panicked never reports a final state; it is seen as
    /// failed once its sender is gone.
    pub fn state(&self) -> TaskState {
        let state = *self.state_rx.borrow();
        if !state.is_finished() && self.state_rx.has_changed().is_err() {
            return TaskState::Failed { exit_code: None };
        }
        state
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Signal the job to stop.
    pub fn cancel(&self) -> CancelOutcome {
        if self.is_finished() {
            return CancelOutcome::AlreadyFinished;
        }
        if self.token.is_cancelled() {
            return CancelOutcome::AlreadyCancelled;
        }
        self.token.cancel();
        CancelOutcome::Cancelled
    }

    /// Wait until the job reaches a final state.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state_rx.clone();
        let state = match rx.wait_for(TaskState::is_finished).await {
            Ok(state) => *state,
            Err(_) => TaskState::Failed { exit_code: None },
        };
        state
    }
}
