pub mod job;
pub mod selector;

pub use job::{Application, Cluster, Command, Job, JobRequest, JobStatus, KillEndpoint};
pub use selector::{ClusterSelector, RandomClusterSelector};
