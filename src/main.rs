//! ranked-mirror - A quota-aware mirror of ranked ladder standings
//!
//! This is the main entry point for the ranked-mirror application.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use ranked_mirror::api::RiotApi;
use ranked_mirror::config::Config;
use ranked_mirror::logging::init_tracing;
use ranked_mirror::sync::{LadderSync, SchedulerConfig, SyncDriver, SyncScheduler, Syncable};

/// ranked-mirror - A quota-aware mirror of ranked ladder standings
#[derive(Parser, Debug)]
#[command(name = "ranked-mirror")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "RANKED_MIRROR_CONFIG")]
    config: Option<String>,

    /// Run a single pass and exit instead of scheduling
    #[arg(long)]
    once: bool,

    /// Visit only the first N shards of each queue
    #[arg(long)]
    max_shards: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = load_config(&args)?;
    if let Some(limit) = args.max_shards {
        config.sync.max_shards = Some(limit);
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize tracing/logging
    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        shards = config.sync.shards.len(),
        queues = config.sync.queue_types.len(),
        store = %config.sync.store_path,
        "Starting ranked-mirror"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let api = RiotApi::from_config(&config, Some(shutdown_tx.subscribe()))?;
    let mut driver = SyncDriver::from_config(api, &config);

    if args.once {
        let signal_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = signal_tx.send(());
        });

        let result = driver.run().await;
        return match result {
            Ok(summary) => {
                info!(
                    pages = summary.pages_merged,
                    created = summary.records_created,
                    updated = summary.records_updated,
                    history = summary.history_appended,
                    "Single pass complete"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Single pass failed");
                Err(e.into())
            }
        };
    }

    let job: Arc<dyn Syncable> = Arc::new(LadderSync::new(
        driver,
        Duration::from_secs(config.sync.interval_secs),
    ));
    let scheduler = SyncScheduler::new(
        SchedulerConfig::from(&config.sync),
        vec![job],
        shutdown_tx.subscribe(),
    );
    let scheduler = tokio::spawn(scheduler.run());

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    if let Err(e) = scheduler.await {
        error!(error = %e, "Scheduler task failed");
    }

    info!("ranked-mirror shutdown complete");
    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
