//! CLI command handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tokio::signal;
use tracing::{error, info};
use vigil_core::{ClusterDeclaration, DaemonKind, SupervisorConfig};
use vigil_reconciler::{
    CheckLauncher, FileDesiredStateProvider, HttpCheckerFactory, LoggingWatcherLauncher,
    LoopConfig, MonitoringReconcilerBuilder, ReconciliationLoop, is_monitoring_disabled,
};

use crate::cli::Commands;

/// Execute a CLI command.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run { config, interval } => cmd_run(&config, interval).await,
        Commands::Check { config } => cmd_check(&config),
    }
}

/// Run the reconciliation loop until Ctrl+C, then tear everything down.
async fn cmd_run(config_path: &Path, interval: Option<u64>) -> Result<()> {
    let config = SupervisorConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let interval = match interval {
        Some(0) => bail!("--interval must be positive"),
        Some(secs) => Duration::from_secs(secs),
        None => config.supervisor.reconcile_interval(),
    };

    let factory = HttpCheckerFactory::new()
        .with_timeout(config.supervisor.probe_timeout())
        .with_failure_threshold(config.supervisor.failure_threshold);
    let reconciler = MonitoringReconcilerBuilder::new()
        .with_launcher(Arc::new(CheckLauncher::new(factory)))
        .with_watchers(Arc::new(LoggingWatcherLauncher))
        .build()
        .context("Failed to build monitoring reconciler")?;
    let provider = Arc::new(FileDesiredStateProvider::new(config_path));

    let mut loop_runner =
        ReconciliationLoop::new(Arc::new(reconciler), provider, LoopConfig { interval });
    let stopper = loop_runner.stopper();

    info!(
        config = %config_path.display(),
        clusters = config.clusters.len(),
        interval_secs = interval.as_secs(),
        "Vigil is running. Press Ctrl+C to stop."
    );
    let handle = tokio::spawn(async move { loop_runner.run().await });

    wait_for_shutdown().await;
    stopper.stop();

    handle
        .await
        .context("Reconciliation loop task failed")?
        .context("Reconciliation loop exited with an error")?;

    info!("Vigil stopped gracefully");
    Ok(())
}

/// Validate the configuration and print what would be supervised.
fn cmd_check(config_path: &Path) -> Result<()> {
    let config = SupervisorConfig::load(config_path)
        .with_context(|| format!("Invalid configuration {}", config_path.display()))?;

    let report = json!({
        "reconcile_interval_secs": config.supervisor.reconcile_interval_secs,
        "probe_timeout_secs": config.supervisor.probe_timeout_secs,
        "failure_threshold": config.supervisor.failure_threshold,
        "clusters": config.clusters.iter().map(describe_cluster).collect::<Vec<_>>(),
    });
    let rendered =
        serde_json::to_string_pretty(&report).context("Failed to render desired state")?;
    println!("{rendered}");
    Ok(())
}

fn describe_cluster(cluster: &ClusterDeclaration) -> Value {
    let daemons: serde_json::Map<String, Value> = DaemonKind::ALL
        .into_iter()
        .map(|kind| {
            let monitoring = if is_monitoring_disabled(kind.as_str(), &cluster.spec) {
                "disabled"
            } else {
                "enabled"
            };
            (
                kind.as_str().to_string(),
                json!({
                    "monitoring": monitoring,
                    "interval_secs": cluster.spec.check_interval(kind).as_secs(),
                    "endpoint": cluster.spec.endpoints.get(kind),
                }),
            )
        })
        .collect();

    json!({
        "namespace": cluster.namespace,
        "ceph_user": cluster.ceph_user,
        "remove_osds_if_out_and_safe_to_remove": cluster.spec.remove_osds_if_out_and_safe_to_remove,
        "daemons": daemons,
    })
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
