use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use jobnode::error::{NodeError, Result};
use jobnode::orchestrator::{CancellationChannel, JobOrchestrator, SubmissionPipeline};
use jobnode::scheduler::{Job, JobRequest, JobStatus, KillEndpoint};
use jobnode::store::{JobStore, MemoryJobStore};

#[derive(Default)]
struct RecordingPipeline {
    submitted: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl SubmissionPipeline for RecordingPipeline {
    async fn submit(&self, request: JobRequest) -> Result<()> {
        if self.fail {
            return Err(NodeError::Unavailable("no capacity".into()));
        }
        self.submitted.lock().unwrap().push(request.id);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingChannel {
    kills: Mutex<Vec<KillEndpoint>>,
}

#[async_trait]
impl CancellationChannel for RecordingChannel {
    async fn send_kill(&self, endpoint: &KillEndpoint) -> Result<()> {
        self.kills.lock().unwrap().push(endpoint.clone());
        Ok(())
    }
}

/// Store whose lookups always fail, to check error propagation.
struct BrokenStore {
    calls: AtomicUsize,
}

#[async_trait]
impl JobStore for BrokenStore {
    async fn exists(&self, _job_id: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NodeError::Unavailable("store offline".into()))
    }
    async fn get(&self, _job_id: &str) -> Result<Option<Job>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NodeError::Unavailable("store offline".into()))
    }
    async fn save(&self, _job: Job) -> Result<()> {
        unreachable!()
    }
    async fn mark_running(&self, _job_id: &str, _kill_endpoint: KillEndpoint) -> Result<()> {
        unreachable!()
    }
    async fn mark_finished(&self, _job_id: &str, _status: JobStatus, _exit_code: Option<i32>) -> Result<()> {
        unreachable!()
    }
}

struct Harness {
    store: Arc<MemoryJobStore>,
    pipeline: Arc<RecordingPipeline>,
    channel: Arc<RecordingChannel>,
    orchestrator: JobOrchestrator,
}

fn harness() -> Harness {
    harness_with(RecordingPipeline::default())
}

fn harness_with(pipeline: RecordingPipeline) -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let pipeline = Arc::new(pipeline);
    let channel = Arc::new(RecordingChannel::default());
    let orchestrator = JobOrchestrator::new(store.clone(), pipeline.clone(), channel.clone());
    Harness {
        store,
        pipeline,
        channel,
        orchestrator,
    }
}

fn job(id: &str, status: JobStatus, endpoint: Option<KillEndpoint>) -> Job {
    let mut job = Job::new(JobRequest::new("test", "tester").with_id(id));
    job.status = status;
    job.kill_endpoint = endpoint;
    job
}

#[tokio::test]
async fn test_submit_job_delegates_to_pipeline() {
    let h = harness();
    let request = JobRequest::new("etl", "alice");
    let id = request.id.clone();

    let returned = h.orchestrator.submit_job(request).await.unwrap();

    assert_eq!(returned, id);
    assert_eq!(*h.pipeline.submitted.lock().unwrap(), vec![id]);
}

#[tokio::test]
async fn test_submit_job_that_exists() {
    let h = harness();
    h.store.put(job("dup", JobStatus::Running, None)).await;

    let result = h
        .orchestrator
        .submit_job(JobRequest::new("etl", "alice").with_id("dup"))
        .await;

    assert!(matches!(result, Err(NodeError::Conflict(_))));
    assert!(h.pipeline.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_job_propagates_pipeline_errors() {
    let h = harness_with(RecordingPipeline {
        fail: true,
        ..Default::default()
    });
    let result = h.orchestrator.submit_job(JobRequest::new("etl", "alice")).await;
    assert!(matches!(result, Err(NodeError::Unavailable(_))));
}

#[tokio::test]
async fn test_kill_job_no_job() {
    let h = harness();
    let result = h.orchestrator.kill_job("missing").await;
    assert!(matches!(result, Err(NodeError::NotFound(_))));
    assert!(h.channel.kills.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_trying_to_kill_initializing_job() {
    let h = harness();
    h.store.put(job("init", JobStatus::Init, None)).await;

    let result = h.orchestrator.kill_job("init").await;

    assert!(matches!(result, Err(NodeError::Precondition(_))));
    assert!(h.channel.kills.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_status_check_precedes_endpoint_check() {
    let h = harness();
    // INIT with an endpoint still fails on status
    h.store
        .put(job("init", JobStatus::Init, Some(KillEndpoint::new("n1", "init"))))
        .await;

    let err = h.orchestrator.kill_job("init").await.unwrap_err();
    match err {
        NodeError::Precondition(msg) => assert!(msg.contains("initializing"), "{}", msg),
        other => panic!("unexpected error: {}", other),
    }
    assert!(h.channel.kills.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_kill_job_no_kill_endpoint() {
    let h = harness();
    h.store.put(job("run", JobStatus::Running, None)).await;

    let err = h.orchestrator.kill_job("run").await.unwrap_err();
    match err {
        NodeError::Precondition(msg) => assert!(msg.contains("kill endpoint"), "{}", msg),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_kill_running_job_signals_endpoint() {
    let h = harness();
    let endpoint = KillEndpoint::new("n1", "run");
    h.store
        .put(job("run", JobStatus::Running, Some(endpoint.clone())))
        .await;

    h.orchestrator.kill_job("run").await.unwrap();

    assert_eq!(*h.channel.kills.lock().unwrap(), vec![endpoint]);
}

#[tokio::test]
async fn test_kill_finished_job_is_harmless() {
    let h = harness();
    for (id, status) in [
        ("ok", JobStatus::Succeeded),
        ("bad", JobStatus::Failed),
        ("dead", JobStatus::Killed),
    ] {
        h.store
            .put(job(id, status, Some(KillEndpoint::new("n1", id))))
            .await;
        h.orchestrator.kill_job(id).await.unwrap();
    }
    assert_eq!(h.channel.kills.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_store_errors_propagate_unchanged() {
    let store = Arc::new(BrokenStore {
        calls: AtomicUsize::new(0),
    });
    let pipeline = Arc::new(RecordingPipeline::default());
    let orchestrator = JobOrchestrator::new(
        store.clone(),
        pipeline.clone(),
        Arc::new(RecordingChannel::default()),
    );

    let submit = orchestrator.submit_job(JobRequest::new("etl", "alice")).await;
    assert!(matches!(submit, Err(NodeError::Unavailable(msg)) if msg == "store offline"));
    let kill = orchestrator.kill_job("any").await;
    assert!(matches!(kill, Err(NodeError::Unavailable(msg)) if msg == "store offline"));

    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    assert!(pipeline.submitted.lock().unwrap().is_empty());
}
