use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Init,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobStatus {
    /// Returns true once the job can no longer change status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Killed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Running => 1,
            Self::Succeeded | Self::Failed | Self::Killed => 2,
        }
    }

    /// Status only moves forward: INIT -> RUNNING -> terminal.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Init => write!(f, "INIT"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Killed => write!(f, "KILLED"),
        }
    }
}

/// A cluster jobs can be sent to. Selection never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub tags: BTreeSet<String>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
}

impl Application {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub name: String,
    /// Program (and fixed leading arguments) the job arguments are appended to.
    pub executable: String,
    pub tags: BTreeSet<String>,
    pub applications: Vec<Application>,
}

impl Command {
    pub fn new(id: impl Into<String>, name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            executable: executable.into(),
            tags: BTreeSet::new(),
            applications: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_application(mut self, application: Application) -> Self {
        self.applications.push(application);
        self
    }
}

/// A request to run a job on this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: String,
    pub name: String,
    pub user: String,
    pub command_args: Vec<String>,
    pub cluster_tags: BTreeSet<String>,
    pub command_tags: BTreeSet<String>,
    pub memory_mb: Option<u64>,
}

impl JobRequest {
    pub fn new(name: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            user: user.into(),
            command_args: Vec::new(),
            cluster_tags: BTreeSet::new(),
            command_tags: BTreeSet::new(),
            memory_mb: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cluster_tag(mut self, tag: impl Into<String>) -> Self {
        self.cluster_tags.insert(tag.into());
        self
    }

    pub fn with_command_tag(mut self, tag: impl Into<String>) -> Self {
        self.command_tags.insert(tag.into());
        self
    }

    pub fn with_memory(mut self, memory_mb: u64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }
}

/// Where a kill signal for a running job has to be delivered.
///
/// Rendered as `local://<node>/jobs/<job_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KillEndpoint {
    pub node: String,
    pub job_id: String,
}

impl KillEndpoint {
    const SCHEME: &'static str = "local://";

    pub fn new(node: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            job_id: job_id.into(),
        }
    }
}

impl std::fmt::Display for KillEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}/jobs/{}", Self::SCHEME, self.node, self.job_id)
    }
}

/// A job as recorded in the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub kill_endpoint: Option<KillEndpoint>,
    pub request: JobRequest,
    pub cluster_id: Option<String>,
    pub command_id: Option<String>,
    pub memory_mb: u64,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: request.id.clone(),
            status: JobStatus::Init,
            kill_endpoint: None,
            request,
            cluster_id: None,
            command_id: None,
            memory_mb: 0,
            exit_code: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}
