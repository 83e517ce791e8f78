//! The supervised entity: one storage cluster and its monitoring bookkeeping.

use tracing::info;
use vigil_core::{ClusterSpec, DaemonKind};

use crate::gate::ActivationGate;
use crate::registry::MonitoringRegistry;
use crate::signal::{SignalId, StopHandle, StopSignal};
use crate::types::{ClusterContext, MonitoringState};

/// A storage cluster under supervision.
///
/// Owns everything the reconciler mutates for this cluster. Clusters share
/// nothing, so each one can be reconciled independently. Mutation needs
/// `&mut self`; a host that shares a cluster between tasks must wrap it in a
/// mutex.
#[derive(Debug)]
pub struct SupervisedCluster {
    pub(crate) context: ClusterContext,
    pub(crate) registry: MonitoringRegistry,
    pub(crate) gate: ActivationGate,
    stop: StopHandle,
}

impl SupervisedCluster {
    /// Start supervising the cluster in `namespace`.
    pub fn new(namespace: impl Into<String>, spec: ClusterSpec) -> Self {
        let (stop, _) = StopHandle::new();
        Self {
            context: ClusterContext::new(namespace, spec),
            registry: MonitoringRegistry::new(),
            gate: ActivationGate::new(),
            stop,
        }
    }

    /// Namespace identifying the cluster.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.context.namespace
    }

    /// Current desired-state snapshot.
    #[must_use]
    pub const fn spec(&self) -> &ClusterSpec {
        &self.context.spec
    }

    /// Context handed to checks and watchers.
    #[must_use]
    pub const fn context(&self) -> &ClusterContext {
        &self.context
    }

    /// Replace the desired-state snapshot read by the next pass.
    pub fn update_spec(&mut self, spec: ClusterSpec) {
        self.context.spec = spec;
    }

    /// Monitoring bookkeeping.
    #[must_use]
    pub const fn registry(&self) -> &MonitoringRegistry {
        &self.registry
    }

    /// Whether the auxiliary watchers were started.
    #[must_use]
    pub const fn watchers_activated(&self) -> bool {
        self.gate.is_activated()
    }

    /// Lifecycle state of every daemon kind.
    #[must_use]
    pub fn monitoring_status(&self) -> Vec<(DaemonKind, MonitoringState)> {
        DaemonKind::ALL
            .into_iter()
            .map(|daemon| (daemon, self.registry.state(daemon)))
            .collect()
    }

    /// One-line `kind=state` rendering of [`Self::monitoring_status`] for logs.
    #[must_use]
    pub fn status_summary(&self) -> String {
        self.monitoring_status()
            .into_iter()
            .map(|(daemon, state)| format!("{daemon}={}", state.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Cluster-wide signal observed by the auxiliary watchers.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.subscribe()
    }

    /// Whether the cluster was torn down.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.stop.is_fired()
    }

    /// Stop every running health check and the auxiliary watchers.
    ///
    /// Fire-and-forget and idempotent. Returns the health checks stopped by
    /// this call.
    pub fn teardown(&mut self) -> Vec<(DaemonKind, SignalId)> {
        let stopped = self.registry.stop_all();
        if self.stop.fire() {
            info!(
                namespace = %self.context.namespace,
                health_checks = stopped.len(),
                "cluster torn down, monitoring stopped"
            );
        }
        stopped
    }
}

impl Drop for SupervisedCluster {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}
