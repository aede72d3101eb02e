use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntCounter, IntGauge, Opts, Registry};

use crate::error::Result;

/// Point-in-time totals over the tracking table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub tracked: usize,
    pub active: usize,
    pub memory_mb: u64,
}

/// Where the gauges read their values from when scraped.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> TrackerSnapshot;
}

/// Prometheus instruments published by the job tracker.
///
/// - `jobnode_jobs_tracked` - jobs currently held in the tracking table
/// - `jobnode_jobs_active` - tracked jobs that have been scheduled
/// - `jobnode_jobs_memory_used_mb` - memory reserved by tracked jobs
/// - `jobnode_jobs_unable_to_cancel_total` - cancellations that did not take
///
/// The gauges are computed from the table on every gather, so they never
/// lag behind the tracker.
#[derive(Clone)]
pub struct TrackerMetrics {
    source: Arc<dyn SnapshotSource>,
    tracked: IntGauge,
    active: IntGauge,
    memory_used: IntGauge,
    unable_to_cancel: IntCounter,
}

impl TrackerMetrics {
    pub fn new(registry: &Registry, source: Arc<dyn SnapshotSource>) -> Result<Self> {
        let metrics = Self {
            source,
            tracked: IntGauge::with_opts(Opts::new(
                "jobnode_jobs_tracked",
                "Number of jobs tracked on this node",
            ))?,
            active: IntGauge::with_opts(Opts::new(
                "jobnode_jobs_active",
                "Number of scheduled jobs on this node",
            ))?,
            memory_used: IntGauge::with_opts(Opts::new(
                "jobnode_jobs_memory_used_mb",
                "Memory in MB reserved by jobs on this node",
            ))?,
            unable_to_cancel: IntCounter::with_opts(Opts::new(
                "jobnode_jobs_unable_to_cancel_total",
                "Number of job tasks that could not be cancelled",
            ))?,
        };
        registry.register(Box::new(metrics.clone()))?;
        Ok(metrics)
    }

    pub(crate) fn record_unable_to_cancel(&self) {
        self.unable_to_cancel.inc();
    }

    pub fn unable_to_cancel(&self) -> u64 {
        self.unable_to_cancel.get()
    }

    pub fn tracked(&self) -> i64 {
        self.source.snapshot().tracked as i64
    }

    pub fn active(&self) -> i64 {
        self.source.snapshot().active as i64
    }

    pub fn memory_used(&self) -> i64 {
        self.source.snapshot().memory_mb as i64
    }
}

impl Collector for TrackerMetrics {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.tracked.desc();
        descs.extend(self.active.desc());
        descs.extend(self.memory_used.desc());
        descs.extend(self.unable_to_cancel.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.source.snapshot();
        self.tracked.set(snapshot.tracked as i64);
        self.active.set(snapshot.active as i64);
        self.memory_used.set(snapshot.memory_mb as i64);

        let mut families = self.tracked.collect();
        families.extend(self.active.collect());
        families.extend(self.memory_used.collect());
        families.extend(self.unable_to_cancel.collect());
        families
    }
}

impl std::fmt::Debug for TrackerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerMetrics")
            .field("snapshot", &self.source.snapshot())
            .field("unable_to_cancel", &self.unable_to_cancel.get())
            .finish()
    }
}
