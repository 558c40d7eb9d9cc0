#![doc = include_str!("../README.md")]

use clap::Parser;
use pfn_collector::collector::{
    config::{CliArgs, CollectorConfig},
    service::Collector,
    shutdown::{ShutdownCoordinator, ShutdownReason},
    telemetry::{init_telemetry, shutdown_telemetry},
};
use std::sync::Arc;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CollectorConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let collector = Collector::new(config);
    let signals = tokio::spawn(shutdown_signal(collector.coordinator()));

    let outcome = collector.run().await;
    signals.abort();
    shutdown_telemetry(providers);

    let report = outcome?;
    if !report.is_success() {
        anyhow::bail!(
            "run did not complete cleanly ({}): {} of {} units failed, {} write errors",
            report.reason,
            report.units_failed,
            report.units_total,
            report.write_errors
        );
    }
    Ok(())
}

fn log_startup_info(config: &CollectorConfig) {
    let generation = &config.generation;
    if cfg!(debug_assertions) {
        tracing::info!("Starting collection with full config: {config:#?}");
    } else {
        tracing::info!(
            "Starting collection of {} draw sets in chunks of {} with {} workers",
            config.count,
            config.chunk_size,
            config.num_workers
        );
    }

    let target = generation.target_size();
    if target < generation.size {
        tracing::warn!(
            "Range [{}, {}] only holds {target} distinct values; collecting {target} per index instead of {}",
            generation.min,
            generation.max,
            generation.size
        );
    }
}

/// Waits for the first termination signal and asks the run to stop.
///
/// A signal that cannot be installed is logged and never fires.
async fn shutdown_signal(coordinator: Arc<ShutdownCoordinator>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let other = async {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};

        let kinds = [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::user_defined1(), "SIGUSR1"),
            (SignalKind::user_defined2(), "SIGUSR2"),
        ];
        let waits = kinds.into_iter().filter_map(|(kind, name)| match unix_signal(kind) {
            Ok(mut stream) => Some(Box::pin(async move {
                stream.recv().await;
                name
            })),
            Err(e) => {
                tracing::error!("Failed to install {name} handler: {e}");
                None
            }
        });
        let waits: Vec<_> = waits.collect();
        if waits.is_empty() {
            std::future::pending::<&'static str>().await
        } else {
            futures::future::select_all(waits).await.0
        }
    };

    #[cfg(not(unix))]
    let other = std::future::pending::<&'static str>();

    let name = tokio::select! {
        name = ctrl_c => name,
        name = other => name,
    };

    tracing::info!("Received {name}, finishing in-flight units...");
    coordinator.request(ShutdownReason::Interrupted(String::from(name)));
}
