use std::path::PathBuf;

use crate::scheduler::{Cluster, Command};

/// Memory admission limits for jobs on this node, all in MB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Total memory jobs may reserve on this node.
    pub max_system_memory_mb: u64,
    /// Memory reserved for a job that does not ask for any.
    pub default_job_memory_mb: u64,
    /// Largest amount a single job may ask for.
    pub max_job_memory_mb: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_system_memory_mb: 30_720,
            default_job_memory_mb: 1_536,
            max_job_memory_mb: 10_240,
        }
    }
}

/// How job processes are started.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Shell invoked as `<shell> -c <command line>`
    pub shell: String,
    /// Working directory for job processes; inherits ours when unset
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Name other components use to address this node in kill endpoints.
    pub node_name: String,
    pub memory: MemoryConfig,
    pub executor: ExecutorConfig,
    /// Clusters jobs submitted here may run on.
    pub clusters: Vec<Cluster>,
    /// Commands jobs submitted here may run, in preference order.
    pub commands: Vec<Command>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "localhost".to_string(),
            memory: MemoryConfig::default(),
            executor: ExecutorConfig::default(),
            clusters: vec![Cluster::new("local", "local")],
            commands: vec![Command::new("shell", "shell", "")],
        }
    }
}

impl NodeConfig {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Default::default()
        }
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the cluster list.
    pub fn with_clusters(mut self, clusters: Vec<Cluster>) -> Self {
        self.clusters = clusters;
        self
    }

    /// Replace the command list.
    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = commands;
        self
    }
}
