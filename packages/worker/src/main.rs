use std::path::PathBuf;
use std::sync::Arc;

use actors::{Dispatcher, OperationRegistry, WorkerArgs, await_drained, start_worker};
use anyhow::Result;
use broker::RedisBroker;
use clap::Parser;
use tokio::sync::{broadcast, watch};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use xrender_core::{WorkerEvent, WorkerId, WorkerStats};

mod config;
mod operations;

#[derive(Parser, Debug)]
#[clap(about = "Long-running process serving xRender jobs from Redis")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, env = "XRENDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Redis host.
    #[clap(long, env = "XRENDER_REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    /// Redis port.
    #[clap(long, env = "XRENDER_REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    /// Private key of the deployment; its SHA-1 names the input list.
    #[clap(long, env = "XRENDER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Jobs served before the process exits.
    #[clap(long, env = "XRENDER_MAX_JOBS", default_value_t = 1000)]
    pub max_jobs: u64,

    /// Seconds a single pop waits for a job (0 waits forever).
    #[clap(long, env = "XRENDER_POP_TIMEOUT_SECS", default_value_t = 5)]
    pub pop_timeout_secs: u64,

    /// Fail operations running longer than this many seconds.
    #[clap(long, env = "XRENDER_OPERATION_TIMEOUT_SECS")]
    pub operation_timeout_secs: Option<u64>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            redis_host: args.redis_host.clone(),
            redis_port: args.redis_port,
            private_key: args.private_key.clone(),
            max_jobs: args.max_jobs,
            pop_timeout_secs: args.pop_timeout_secs,
            operation_timeout_secs: args.operation_timeout_secs,
        }
    }
}

/// Forward worker events to the log.
fn log_events(mut events: broadcast::Receiver<WorkerEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!("{}", event.description()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} worker events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("XRENDER_LOG")
                .from_env_lossy(),
        )
        .try_init()?;

    info!("Bootstrapped xrender-worker {}", env!("CARGO_PKG_VERSION"));

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  broker: {}", app_config.broker.endpoint());
    info!(
        "  max jobs per process: {}",
        app_config.worker.max_jobs_per_process
    );

    let broker = Arc::new(RedisBroker::connect(&app_config.broker).await?);

    let mut registry = OperationRegistry::new();
    operations::register_builtin(&mut registry)?;

    let mut dispatcher = Dispatcher::new(Arc::new(registry));
    if let Some(timeout) = app_config.worker.operation_timeout() {
        dispatcher = dispatcher.with_timeout(timeout);
    }

    let (event_tx, events) = broadcast::channel(256);
    log_events(events);

    let worker_id = WorkerId::new();
    let (status_tx, status) = watch::channel(WorkerStats::new(worker_id));

    let (_worker, handle) = start_worker(WorkerArgs {
        worker_id,
        input_list: app_config.input_list(),
        broker,
        dispatcher,
        config: app_config.worker.clone(),
        event_tx: Some(event_tx),
        status_tx: Some(status_tx),
    })
    .await?;

    let stats = await_drained(handle, status).await?;

    info!(
        "Worker drained after {} jobs, exiting (memory usage: {})",
        stats.processed,
        stats.memory_usage()
    );
    Ok(())
}
