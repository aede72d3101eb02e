use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Node unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: crate::scheduler::JobStatus,
        to: crate::scheduler::JobStatus,
    },

    #[error("Launch error: {0}")]
    Launch(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
