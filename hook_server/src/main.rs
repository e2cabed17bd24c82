//! Hookrunner — webhook-triggered deployment server.
//!
//! Each registered repository is a git working tree on this host. A trigger
//! at `/hooks/{name}` queues a job; one worker pulls the tree, runs its
//! hooks, rolls back on failure and reports the result to the configured
//! notification targets.

mod config;
mod metrics;
mod routes;

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use hook_pipeline::{JobPipeline, JobQueue, NotificationDispatcher, Registry};

#[derive(Parser)]
#[command(name = "hookrunner", about = "Webhook-triggered deployment runner")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "APP_PORT", default_value = "8080")]
    port: u16,

    /// Repository registry (JSON)
    #[arg(long, env = "HOOKS_FILE", default_value = "hooks.json")]
    hooks: PathBuf,
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let stdout = if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let file = match std::env::var("LOG_FILE").ok().filter(|p| !p.is_empty()) {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(&path).parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory for {path}"))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening log file {path}"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();

    tracing::info!("Starting hookrunner...");

    let registry = Registry::load(&cli.hooks)
        .with_context(|| format!("loading registry {}", cli.hooks.display()))?;
    let mut names: Vec<&str> = registry.names().collect();
    names.sort_unstable();
    tracing::info!(repositories = ?names, "Serving hooks");
    let registry = Arc::new(registry);

    let runner = config::RunnerConfig::from_env();
    let notifier = NotificationDispatcher::with_timeout(runner.notify_timeout())
        .context("building notification client")?;
    let pipeline = Arc::new(JobPipeline::new(Arc::new(runner.system_shell()), notifier));

    let capacity = JobQueue::capacity_for(&registry, runner.queue_factor);
    let (queue, worker) = JobQueue::start(registry.clone(), pipeline, capacity);

    let app = routes::hook_router(routes::AppState { registry, queue });

    metrics::init_metrics();

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("hookrunner listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handle; the worker exits once the
    // buffer is drained.
    tracing::info!("Draining queued jobs (Ctrl+C again to abandon)...");
    tokio::select! {
        result = worker => {
            if let Err(e) = result {
                tracing::error!("Job worker failed: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => tracing::warn!("Abandoning queued jobs"),
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
