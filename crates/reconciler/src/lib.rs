//! Monitoring-lifecycle supervision for Ceph clusters.
//!
//! Every supervised cluster runs one background health check per daemon kind
//! (`mon`, `osd`, `status`). The reconciler keeps those checks in line with
//! the cluster spec, which may change at any time:
//!
//! - **Resolve**: ask the cluster spec whether a daemon kind's monitoring is disabled
//! - **Compare**: look up the kind's record in the cluster's registry
//! - **Act**: start, restart (with a fresh stop signal), stop, or do nothing
//! - **Activate**: start the auxiliary watchers on the first pass only
//!
//! # State machine
//!
//! | Current | Disabled | Enabled |
//! |---|---|---|
//! | Absent | no-op | launch, create record |
//! | Running | fire stop, mark stopped | no-op |
//! | Stopped | no-op | launch with new signal |
//!
//! Passes are idempotent: an unchanged spec produces no side effects.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil_reconciler::{
//!     CheckLauncher, HttpCheckerFactory, LoggingWatcherLauncher, LoopConfig,
//!     FileDesiredStateProvider, MonitoringReconciler, ReconciliationLoop,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let reconciler = Arc::new(MonitoringReconciler::new(
//!         Arc::new(CheckLauncher::new(HttpCheckerFactory::new())),
//!         Arc::new(LoggingWatcherLauncher),
//!     ));
//!     let provider = Arc::new(FileDesiredStateProvider::new("vigil.toml"));
//!
//!     let mut loop_runner = ReconciliationLoop::new(reconciler, provider, LoopConfig::default());
//!
//!     // Run until stopped
//!     // loop_runner.run().await;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod checks;
pub mod cluster;
pub mod error;
pub mod gate;
pub mod launcher;
pub mod r#loop;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod signal;
pub mod types;

// Re-export main types
pub use checks::{HealthCheck, HealthCheckResult, HealthProbe, HealthStatus, HttpProbe, PeriodicCheck};
pub use cluster::SupervisedCluster;
pub use error::{Error, Result};
pub use gate::{ActivationGate, LoggingWatcherLauncher, WatcherLauncher};
pub use launcher::{CheckLauncher, CheckerFactory, HttpCheckerFactory, TaskLauncher};
pub use r#loop::{
    DesiredStateProvider, FileDesiredStateProvider, InMemoryDesiredStateProvider, LoopConfig,
    LoopStopper, ReconciliationLoop,
};
pub use reconciler::{MonitoringReconciler, MonitoringReconcilerBuilder};
pub use registry::{MonitoringRecord, MonitoringRegistry};
pub use resolver::is_monitoring_disabled;
pub use signal::{SignalId, StopHandle, StopSignal};
pub use types::{CephUser, ClusterContext, MonitoringState, ReconcileAction, ReconcileResult};
