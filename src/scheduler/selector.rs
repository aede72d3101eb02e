use rand::seq::SliceRandom;

use crate::error::{NodeError, Result};
use crate::scheduler::job::Cluster;

/// Picks the cluster a job runs on from a set of candidates.
///
/// Implementations must be safe to share across tasks; the selector is
/// consulted concurrently for every submitted job.
pub trait ClusterSelector: Send + Sync {
    /// Select one of `candidates`.
    ///
    /// `None` stands for "no candidate list was produced at all" and is
    /// rejected the same way as an empty list.
    fn select_cluster(&self, candidates: Option<&[Cluster]>) -> Result<Cluster>;
}

/// Uniform random choice, independent on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomClusterSelector;

impl RandomClusterSelector {
    pub fn new() -> Self {
        Self
    }
}

impl ClusterSelector for RandomClusterSelector {
    fn select_cluster(&self, candidates: Option<&[Cluster]>) -> Result<Cluster> {
        let candidates = candidates.unwrap_or_default();
        let cluster = candidates
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| NodeError::Precondition("No cluster candidates to select from".into()))?;
        tracing::debug!(
            cluster_id = %cluster.id,
            candidates = candidates.len(),
            "Cluster selected"
        );
        Ok(cluster.clone())
    }
}
