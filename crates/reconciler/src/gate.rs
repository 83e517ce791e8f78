//! One-shot activation of the auxiliary watchers.
//!
//! Besides its health checks every cluster gets a client watcher and a bucket
//! provisioner. They are bound to the cluster's own stop signal, not to any
//! monitoring record, and must start at most once per cluster lifetime.

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{Error, Result};
use crate::signal::StopSignal;
use crate::types::{CephUser, ClusterContext};

/// Latch that lets its activation run at most once.
#[derive(Debug, Default)]
pub struct ActivationGate {
    activated: bool,
}

impl ActivationGate {
    /// Create a closed gate.
    #[must_use]
    pub const fn new() -> Self {
        Self { activated: false }
    }

    /// Whether the activation already ran.
    #[must_use]
    pub const fn is_activated(&self) -> bool {
        self.activated
    }

    /// Run `activate` on the first call only.
    ///
    /// The gate latches before `activate` runs, so whatever it returns, it is
    /// never run again. Returns `None` on every later call.
    pub fn activate_once<R>(&mut self, activate: impl FnOnce() -> R) -> Option<R> {
        if self.activated {
            return None;
        }
        self.activated = true;
        Some(activate())
    }
}

/// Starts the auxiliary watchers of a cluster.
pub trait WatcherLauncher: Send + Sync {
    /// Start the client resource watcher.
    ///
    /// # Errors
    ///
    /// Returns `WatcherFailed` if the watcher could not be started.
    fn start_client_watcher(&self, cluster: &ClusterContext, stop: StopSignal) -> Result<()>;

    /// Start the object bucket provisioner, acting as `user`.
    ///
    /// # Errors
    ///
    /// Returns `WatcherFailed` if the provisioner could not be started.
    fn start_bucket_provisioner(
        &self,
        cluster: &ClusterContext,
        user: &CephUser,
        stop: StopSignal,
    ) -> Result<()>;
}

/// Watchers that only log their lifetime; the real provisioning lives elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingWatcherLauncher;

impl LoggingWatcherLauncher {
    fn spawn(
        name: &'static str,
        namespace: String,
        mut stop: StopSignal,
    ) -> Result<JoinHandle<()>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::watcher_failed(name, format!("no tokio runtime: {e}")))?;
        Ok(runtime.spawn(async move {
            info!(%namespace, watcher = name, "watcher started");
            stop.stopped().await;
            info!(%namespace, watcher = name, "watcher stopped");
        }))
    }
}

impl WatcherLauncher for LoggingWatcherLauncher {
    fn start_client_watcher(&self, cluster: &ClusterContext, stop: StopSignal) -> Result<()> {
        Self::spawn("client", cluster.namespace.clone(), stop).map(drop)
    }

    fn start_bucket_provisioner(
        &self,
        cluster: &ClusterContext,
        user: &CephUser,
        stop: StopSignal,
    ) -> Result<()> {
        info!(namespace = %cluster.namespace, %user, "bucket provisioner acting as ceph user");
        Self::spawn("bucket-provisioner", cluster.namespace.clone(), stop).map(drop)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::arithmetic_side_effects)]

    use std::time::Duration;

    use vigil_core::ClusterSpec;

    use super::*;
    use crate::signal::StopHandle;

    #[test]
    fn test_gate_runs_once() {
        let mut gate = ActivationGate::new();
        let mut runs = 0;

        for _ in 0..5 {
            let _ = gate.activate_once(|| runs += 1);
        }

        assert_eq!(runs, 1);
        assert!(gate.is_activated());
    }

    #[test]
    fn test_gate_latches_even_when_activation_fails() {
        let mut gate = ActivationGate::new();
        let first: Option<std::result::Result<(), &str>> = gate.activate_once(|| Err("boom"));
        assert_eq!(first, Some(Err("boom")));
        assert_eq!(gate.activate_once(|| Ok::<(), &str>(())), None);
    }

    #[tokio::test]
    async fn test_logging_watchers_exit_on_cluster_stop() {
        let cluster = ClusterContext::new("rook-ceph", ClusterSpec::new());
        let (stop, signal) = StopHandle::new();

        let task = LoggingWatcherLauncher::spawn("client", cluster.namespace.clone(), signal);
        assert!(task.is_ok());
        stop.fire();

        if let Ok(task) = task {
            let joined = tokio::time::timeout(Duration::from_secs(1), task).await;
            assert!(matches!(joined, Ok(Ok(()))));
        }
    }

    #[test]
    fn test_watchers_outside_runtime_report_failure() {
        let cluster = ClusterContext::new("rook-ceph", ClusterSpec::new());
        let (_stop, signal) = StopHandle::new();

        let result = LoggingWatcherLauncher.start_client_watcher(&cluster, signal.clone());
        assert!(matches!(result, Err(Error::WatcherFailed { .. })));

        let result = LoggingWatcherLauncher.start_bucket_provisioner(
            &cluster,
            &CephUser::new("client.admin"),
            signal,
        );
        assert!(matches!(result, Err(Error::WatcherFailed { .. })));
    }
}
