use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use jobnode::config::{MemoryConfig, NodeConfig};
use jobnode::node::Node;
use jobnode::scheduler::{Cluster, Job, JobRequest};
use jobnode::shutdown::install_shutdown_handler;
use jobnode::store::JobStore;

#[derive(Parser, Debug)]
#[command(name = "jobnode")]
#[command(version)]
#[command(about = "Run jobs on a single job-execution node")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Submit shell commands as jobs and wait for them to finish
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Name of this node, used in kill endpoints
    #[arg(long, default_value = "localhost")]
    node_name: String,

    /// Clusters jobs may run on (format: "id" or "id:tag1,tag2")
    #[arg(long = "cluster")]
    clusters: Vec<String>,

    /// Only run on clusters carrying this tag
    #[arg(long)]
    cluster_tag: Vec<String>,

    /// Memory to reserve per job in MB
    #[arg(long)]
    memory: Option<u64>,

    /// Total memory jobs may reserve on this node in MB
    #[arg(long, default_value = "30720")]
    max_system_memory: u64,

    /// Largest memory a single job may reserve in MB
    #[arg(long, default_value = "10240")]
    max_job_memory: u64,

    /// Kill jobs still running after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print Prometheus metrics after all jobs finished
    #[arg(long)]
    metrics: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,

    /// Shell command lines, one job each
    #[arg(required = true)]
    commands: Vec<String>,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
struct JobSummary {
    job_id: String,
    name: String,
    status: String,
    cluster_id: Option<String>,
    memory_mb: u64,
    exit_code: Option<i32>,
    duration_ms: Option<i64>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            name: job.request.name.clone(),
            status: job.status.to_string(),
            cluster_id: job.cluster_id.clone(),
            memory_mb: job.memory_mb,
            exit_code: job.exit_code,
            duration_ms: match (job.started_at, job.finished_at) {
                (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
                _ => None,
            },
        }
    }
}

fn parse_cluster(spec: &str) -> Cluster {
    match spec.split_once(':') {
        Some((id, tags)) => tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .fold(Cluster::new(id, id), |c, tag| c.with_tag(tag)),
        None => Cluster::new(spec, spec),
    }
}

fn build_config(args: &RunArgs) -> NodeConfig {
    let mut config = NodeConfig::new(args.node_name.clone()).with_memory(MemoryConfig {
        max_system_memory_mb: args.max_system_memory,
        max_job_memory_mb: args.max_job_memory,
        ..MemoryConfig::default()
    });
    if !args.clusters.is_empty() {
        config = config.with_clusters(args.clusters.iter().map(|c| parse_cluster(c)).collect());
    }
    config
}

async fn run_jobs(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::new(build_config(&args))?;
    let shutdown = install_shutdown_handler()?;
    let user = std::env::var("USER").unwrap_or_else(|_| "jobnode".to_string());

    let mut job_ids = Vec::new();
    for (i, line) in args.commands.iter().enumerate() {
        let mut request = JobRequest::new(format!("job-{}", i + 1), user.clone()).with_args([line.clone()]);
        for tag in &args.cluster_tag {
            request = request.with_cluster_tag(tag.clone());
        }
        if let Some(memory) = args.memory {
            request = request.with_memory(memory);
        }
        match node.orchestrator.submit_job(request).await {
            Ok(id) => job_ids.push(id),
            Err(e) => eprintln!("Failed to submit '{}': {}", line, e),
        }
    }

    let deadline = args
        .timeout_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut killing = false;
    loop {
        tokio::select! {
            _ = shutdown.cancelled(), if !killing => {
                killing = true;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }

        if deadline.is_some_and(|d| Instant::now() >= d) && !killing {
            tracing::warn!("Timeout reached, killing running jobs");
            killing = true;
        }
        if killing {
            node.kill_all().await;
        }

        let mut pending = 0;
        for id in &job_ids {
            if let Some(job) = node.store.get(id).await? {
                if !job.status.is_terminal() {
                    pending += 1;
                }
            }
        }
        if pending == 0 && node.tracker.num_tracked_jobs() == 0 {
            break;
        }
    }

    let mut summaries = Vec::new();
    for id in &job_ids {
        if let Some(job) = node.store.get(id).await? {
            summaries.push(JobSummary::from(&job));
        }
    }

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Table => {
            println!(
                "{:<38} {:<8} {:<10} {:<10} {:<6} DURATION",
                "JOB ID", "NAME", "STATUS", "CLUSTER", "EXIT"
            );
            println!("{}", "-".repeat(84));
            for s in &summaries {
                println!(
                    "{:<38} {:<8} {:<10} {:<10} {:<6} {}",
                    s.job_id,
                    s.name,
                    s.status,
                    s.cluster_id.as_deref().unwrap_or("-"),
                    s.exit_code.map_or("-".to_string(), |c| c.to_string()),
                    s.duration_ms.map_or("-".to_string(), |d| format!("{}ms", d)),
                );
            }
        }
    }

    if args.metrics {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&node.registry.gather(), &mut buffer)?;
        println!();
        print!("{}", String::from_utf8_lossy(&buffer));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Run(run_args) => run_jobs(run_args).await?,
    }
    Ok(())
}
