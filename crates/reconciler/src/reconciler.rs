//! Reconciler implementation.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vigil_core::DaemonKind;

use crate::cluster::SupervisedCluster;
use crate::error::{Error, Result};
use crate::gate::{LoggingWatcherLauncher, WatcherLauncher};
use crate::launcher::TaskLauncher;
use crate::resolver::is_monitoring_disabled;
use crate::signal::StopSignal;
use crate::types::{CephUser, ClusterContext, MonitoringState, ReconcileAction, ReconcileResult};

/// Brings a cluster's health checks in line with its spec.
///
/// Holds no per-cluster state: everything it mutates lives in the
/// [`SupervisedCluster`] passed to each call, so one reconciler serves any
/// number of clusters.
pub struct MonitoringReconciler {
    launcher: Arc<dyn TaskLauncher>,
    watchers: Arc<dyn WatcherLauncher>,
}

impl MonitoringReconciler {
    /// Create a new reconciler.
    pub fn new(launcher: Arc<dyn TaskLauncher>, watchers: Arc<dyn WatcherLauncher>) -> Self {
        Self { launcher, watchers }
    }

    /// Run one reconciliation pass for `cluster`.
    ///
    /// For every daemon kind: start monitoring when enabled and absent,
    /// restart it with a fresh stop signal when enabled and stopped, stop it
    /// when disabled and running, otherwise do nothing. Then start the
    /// auxiliary watchers if this is the cluster's first pass.
    ///
    /// Never fails as a whole. A kind whose launch fails keeps its previous
    /// state and is retried on the next pass; the error is reported in
    /// [`ReconcileResult::actions_failed`].
    pub fn configure_monitoring(
        &self,
        cluster: &mut SupervisedCluster,
        user: &CephUser,
    ) -> ReconcileResult {
        let namespace = cluster.namespace().to_string();
        if cluster.is_torn_down() {
            debug!(%namespace, "cluster was torn down, skipping reconciliation");
            return ReconcileResult::new(namespace, Vec::new(), Vec::new());
        }

        let mut taken = Vec::new();
        let mut failed = Vec::new();

        for daemon in DaemonKind::ALL {
            match self.reconcile_daemon(cluster, daemon, user) {
                Ok(Some(action)) => taken.push(action),
                Ok(None) => {}
                Err(e) => {
                    warn!(%namespace, %daemon, error = %e, "failed to reconcile ceph monitoring");
                    failed.push(e);
                }
            }
        }

        let stop = cluster.stop_signal();
        let context = &cluster.context;
        if let Some(errors) = cluster
            .gate
            .activate_once(|| self.start_watchers(context, user, &stop))
        {
            if errors.is_empty() {
                taken.push(ReconcileAction::ActivateWatchers);
            } else {
                failed.extend(errors);
            }
        }

        for action in &taken {
            debug!(%namespace, action = %action.description(), "monitoring action taken");
        }

        let result = ReconcileResult::new(namespace, taken, failed);
        if result.converged {
            debug!(namespace = %result.namespace, "monitoring converged");
        } else {
            info!(
                namespace = %result.namespace,
                actions_taken = result.actions_taken.len(),
                actions_failed = result.actions_failed.len(),
                "monitoring reconciled"
            );
        }
        result
    }

    /// Apply the state machine to one daemon kind.
    fn reconcile_daemon(
        &self,
        cluster: &mut SupervisedCluster,
        daemon: DaemonKind,
        user: &CephUser,
    ) -> Result<Option<ReconcileAction>> {
        let disabled = is_monitoring_disabled(daemon.as_str(), &cluster.context.spec);
        let state = cluster.registry.state(daemon);

        match (state, disabled) {
            (MonitoringState::Absent | MonitoringState::Stopped, true) => Ok(None),
            (MonitoringState::Running, true) => {
                Ok(cluster.registry.record_stop(daemon).map(|signal| {
                    info!(
                        namespace = %cluster.context.namespace,
                        %daemon,
                        %signal,
                        "ceph {daemon} monitoring disabled, stopping health check"
                    );
                    ReconcileAction::StopMonitoring { daemon, signal }
                }))
            }
            (MonitoringState::Running, false) => {
                debug!(
                    namespace = %cluster.context.namespace,
                    %daemon,
                    "ceph {daemon} health check already running"
                );
                Ok(None)
            }
            (MonitoringState::Absent | MonitoringState::Stopped, false) => {
                let handle = self.launcher.launch(daemon, &cluster.context, user)?;
                let record = cluster.registry.record_start(daemon, handle);
                let signal = record.signal();
                Ok(Some(if state == MonitoringState::Absent {
                    ReconcileAction::StartMonitoring { daemon, signal }
                } else {
                    ReconcileAction::RestartMonitoring { daemon, signal }
                }))
            }
        }
    }

    /// Start both watchers, returning whatever failed.
    fn start_watchers(
        &self,
        context: &ClusterContext,
        user: &CephUser,
        stop: &StopSignal,
    ) -> Vec<Error> {
        info!(namespace = %context.namespace, "starting client watcher and bucket provisioner");
        [
            self.watchers.start_client_watcher(context, stop.clone()),
            self.watchers
                .start_bucket_provisioner(context, user, stop.clone()),
        ]
        .into_iter()
        .filter_map(|started| started.err())
        .inspect(|e| warn!(namespace = %context.namespace, error = %e, "watcher did not start"))
        .collect()
    }
}

/// Builder for [`MonitoringReconciler`].
#[derive(Default)]
pub struct MonitoringReconcilerBuilder {
    launcher: Option<Arc<dyn TaskLauncher>>,
    watchers: Option<Arc<dyn WatcherLauncher>>,
}

impl MonitoringReconcilerBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn TaskLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Set the watcher launcher.
    #[must_use]
    pub fn with_watchers(mut self, watchers: Arc<dyn WatcherLauncher>) -> Self {
        self.watchers = Some(watchers);
        self
    }

    /// Build the reconciler. Watchers default to [`LoggingWatcherLauncher`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if no task launcher was set.
    pub fn build(self) -> Result<MonitoringReconciler> {
        let launcher = self
            .launcher
            .ok_or_else(|| Error::invalid_config("task launcher is required"))?;
        let watchers = self
            .watchers
            .unwrap_or_else(|| Arc::new(LoggingWatcherLauncher));
        Ok(MonitoringReconciler::new(launcher, watchers))
    }
}
