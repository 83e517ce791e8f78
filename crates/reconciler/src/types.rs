//! Core types for the reconciler.

use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_core::{ClusterSpec, DaemonKind};

use crate::error::Error;
use crate::signal::SignalId;

/// Ceph identity the health checks and bucket provisioner act as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CephUser(String);

impl CephUser {
    /// Wrap a user name such as `client.admin`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for CephUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a check or watcher needs to know about its cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterContext {
    /// Namespace identifying the cluster.
    pub namespace: String,
    /// Desired state snapshot for the current pass.
    pub spec: ClusterSpec,
}

impl ClusterContext {
    /// Create a new cluster context.
    pub fn new(namespace: impl Into<String>, spec: ClusterSpec) -> Self {
        Self {
            namespace: namespace.into(),
            spec,
        }
    }
}

/// Lifecycle state of one (cluster, daemon kind) monitoring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringState {
    /// No task was ever started for this kind.
    Absent,
    /// A task is active.
    Running,
    /// A task ran and was stopped; the slot is kept.
    Stopped,
}

impl MonitoringState {
    /// Convert to a string representation.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Absent => "absent",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Actions a reconciliation pass can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileAction {
    /// First launch of a health check for this kind.
    StartMonitoring { daemon: DaemonKind, signal: SignalId },
    /// Launch into a slot whose previous task was stopped.
    RestartMonitoring { daemon: DaemonKind, signal: SignalId },
    /// Fire the stop signal of a running check.
    StopMonitoring { daemon: DaemonKind, signal: SignalId },
    /// Start the client watcher and bucket provisioner.
    ActivateWatchers,
}

impl ReconcileAction {
    /// Get the daemon kind this action targets, if any.
    #[must_use]
    pub const fn daemon(&self) -> Option<DaemonKind> {
        match self {
            Self::StartMonitoring { daemon, .. }
            | Self::RestartMonitoring { daemon, .. }
            | Self::StopMonitoring { daemon, .. } => Some(*daemon),
            Self::ActivateWatchers => None,
        }
    }

    /// Get a description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::StartMonitoring { daemon, signal } => {
                format!("start {daemon} health check (signal {signal})")
            }
            Self::RestartMonitoring { daemon, signal } => {
                format!("restart {daemon} health check (signal {signal})")
            }
            Self::StopMonitoring { daemon, signal } => {
                format!("stop {daemon} health check (signal {signal})")
            }
            Self::ActivateWatchers => "activate client and bucket watchers".to_string(),
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileResult {
    /// Namespace of the reconciled cluster.
    pub namespace: String,
    /// Actions that were taken.
    pub actions_taken: Vec<ReconcileAction>,
    /// Actions that failed; their slots were left untouched.
    pub actions_failed: Vec<Error>,
    /// Whether the pass found nothing to do.
    pub converged: bool,
}

impl ReconcileResult {
    /// Create a new reconcile result.
    pub fn new(
        namespace: impl Into<String>,
        actions_taken: Vec<ReconcileAction>,
        actions_failed: Vec<Error>,
    ) -> Self {
        let converged = actions_taken.is_empty() && actions_failed.is_empty();
        Self {
            namespace: namespace.into(),
            actions_taken,
            actions_failed,
            converged,
        }
    }

    /// Check if all actions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.actions_failed.is_empty()
    }

    /// Actions taken for one daemon kind.
    pub fn actions_for(&self, daemon: DaemonKind) -> impl Iterator<Item = &ReconcileAction> {
        self.actions_taken
            .iter()
            .filter(move |action| action.daemon() == Some(daemon))
    }
}
