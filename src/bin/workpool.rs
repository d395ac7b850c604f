//! workpool CLI: run a synthetic workload through a pool and report.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use workpool::config::{Config, ShutdownMode};
use workpool::event::TaskEventKind;
use workpool::telemetry::{TelemetryConfig, init_telemetry};
use workpool::{Error, Pool, Task};

#[derive(Parser)]
#[command(name = "workpool", about = "Cancellable worker pool")]
struct Cli {
    /// TOML config file; environment variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a synthetic workload until it finishes or Ctrl-C is pressed
    Run {
        /// Number of tasks to submit
        #[arg(long, default_value_t = 20)]
        tasks: usize,
        /// Simulated duration of each task in milliseconds
        #[arg(long, default_value_t = 10)]
        task_ms: u64,
        /// Make every Nth task fail (0 disables)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,
        /// Override the number of workers
        #[arg(long)]
        workers: Option<usize>,
        /// Override the queue capacity
        #[arg(long)]
        queue_capacity: Option<usize>,
        /// Override the shutdown deadline in milliseconds
        #[arg(long)]
        shutdown_timeout_ms: Option<u64>,
        /// Cancel queued tasks on shutdown instead of draining them
        #[arg(long)]
        cancel: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Command::Run {
            tasks,
            task_ms,
            fail_every,
            workers,
            queue_capacity,
            shutdown_timeout_ms,
            cancel,
        } => {
            let mut config = config;
            if let Some(workers) = workers {
                config.pool.workers = workers;
            }
            if let Some(capacity) = queue_capacity {
                config.pool.queue_capacity = capacity;
            }
            if let Some(ms) = shutdown_timeout_ms {
                config.shutdown_timeout = Duration::from_millis(ms);
            }
            if cancel {
                config.pool.shutdown_mode = ShutdownMode::Cancel;
            }
            cmd_run(config, tasks, Duration::from_millis(task_ms), fail_every).await
        }
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_run(
    config: Config,
    tasks: usize,
    task_duration: Duration,
    fail_every: usize,
) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "workpool".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let pool = Pool::with_events(config.pool.clone(), events_tx)?;
    pool.start()?;

    let failures = tokio::spawn(async move {
        let mut failures = Vec::new();
        while let Some(event) = events_rx.recv().await {
            if let TaskEventKind::Failed { ref error, .. } = event.kind {
                failures.push(format!("{}: {error}", event.task_id));
            }
        }
        failures
    });

    // Ctrl-C stops submission and starts the shutdown early.
    let interrupted = tokio::spawn({
        let pool = pool.clone();
        let timeout = config.shutdown_timeout;
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                if let Err(e) = pool.shutdown(timeout).await {
                    warn!("shutdown after interrupt: {e}");
                }
            }
        }
    });

    for n in 1..=tasks {
        let fail = fail_every > 0 && n % fail_every == 0;
        let task = Task::new(serde_json::json!({ "n": n }), move |ctx| async move {
            tokio::select! {
                _ = tokio::time::sleep(task_duration) => {}
                _ = ctx.cancelled() => anyhow::bail!("task {n} cancelled"),
            }
            if fail {
                anyhow::bail!("task {n} failed on purpose");
            }
            Ok(())
        });

        match pool.submit(task).await {
            Ok(_) => {}
            Err(Error::PoolNotRunning { .. } | Error::PoolShuttingDown) => {
                warn!(submitted = n - 1, "pool stopped accepting tasks");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let result = pool.shutdown(config.shutdown_timeout).await;
    interrupted.abort();
    let stats = pool.stats();
    drop(pool);

    let stats_line = match result {
        Ok(()) => "stopped cleanly".to_string(),
        Err(ref e) => format!("{e}"),
    };

    // The event channel closes once the pool's last reference is gone,
    // which after a timed-out shutdown may take a while.
    let failures = tokio::time::timeout(Duration::from_secs(1), failures)
        .await
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or_default();

    println!("Shutdown:   {stats_line}");
    println!("Completed:  {}", stats.tasks_completed);
    println!("Failed:     {}", stats.tasks_failed);
    println!("Dropped:    {}", stats.tasks_dropped);
    for failure in &failures {
        println!("  {failure}");
    }

    result.map_err(Into::into)
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("Workers:          {}", config.pool.workers);
    println!("Queue Capacity:   {}", config.pool.queue_capacity);
    println!(
        "Task Timeout:     {}",
        config
            .pool
            .task_timeout
            .map(|t| format!("{}ms", t.as_millis()))
            .unwrap_or("-".to_string())
    );
    println!("Shutdown Mode:    {}", config.pool.shutdown_mode);
    println!("Shutdown Timeout: {}ms", config.shutdown_timeout.as_millis());
    println!(
        "OTel Endpoint:    {}",
        config.otel_endpoint.as_deref().unwrap_or("-")
    );
    println!("Log Level:        {}", config.log_level);
    Ok(())
}
