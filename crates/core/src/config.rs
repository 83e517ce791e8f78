//! Supervisor configuration file.
//!
//! The file declares every supervised cluster and its desired health-check
//! state. It is re-read on each reconciliation tick, so edits take effect
//! without a restart.

use std::path::Path;
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::result::Result;
use crate::spec::{ClusterSpec, DaemonKind};

/// Default delay between reconciliation passes.
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 30;

/// Default timeout of a single health probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Default number of consecutive failed probes before a daemon is unhealthy.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Ceph identity used when a cluster does not name one.
pub const DEFAULT_CEPH_USER: &str = "client.admin";

/// Settings for the host control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub reconcile_interval_secs: u64,
    /// Per-request timeout of the HTTP health probes.
    pub probe_timeout_secs: u64,
    /// Consecutive failed probes before a daemon is reported unhealthy.
    pub failure_threshold: u32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl SupervisorSettings {
    /// Delay between reconciliation passes.
    #[must_use]
    pub const fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Timeout of a single health probe.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn default_ceph_user() -> String {
    DEFAULT_CEPH_USER.to_string()
}

/// One supervised cluster as declared in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDeclaration {
    /// Namespace identifying the cluster.
    pub namespace: String,
    /// Identity the health checks and the bucket provisioner act as.
    #[serde(default = "default_ceph_user")]
    pub ceph_user: String,
    #[serde(default)]
    pub spec: ClusterSpec,
}

impl ClusterDeclaration {
    /// Declare a cluster with the default identity.
    pub fn new(namespace: impl Into<String>, spec: ClusterSpec) -> Self {
        Self {
            namespace: namespace.into(),
            ceph_user: default_ceph_user(),
            spec,
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub supervisor: SupervisorSettings,
    pub clusters: Vec<ClusterDeclaration>,
}

impl SupervisorConfig {
    /// Parse and validate a configuration document.
    ///
    /// # Errors
    ///
    /// Returns `TomlParseFailed` for malformed documents and `InvalidConfig`
    /// when validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::toml_parse_failed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `FileReadFailed` when the file cannot be read, otherwise the
    /// errors of [`SupervisorConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.supervisor.reconcile_interval_secs == 0 {
            return Err(Error::invalid_config(
                "supervisor.reconcile_interval_secs must be positive",
            ));
        }

        if self.supervisor.probe_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "supervisor.probe_timeout_secs must be positive",
            ));
        }

        if self.supervisor.failure_threshold == 0 {
            return Err(Error::invalid_config(
                "supervisor.failure_threshold must be positive",
            ));
        }

        if let Some(cluster) = self.clusters.iter().find(|c| c.namespace.trim().is_empty()) {
            return Err(Error::invalid_config(format!(
                "cluster with ceph user '{}' has an empty namespace",
                cluster.ceph_user
            )));
        }

        if let Some(namespace) = self
            .clusters
            .iter()
            .map(|c| c.namespace.as_str())
            .duplicates()
            .next()
        {
            return Err(Error::invalid_config(format!(
                "cluster namespace '{namespace}' is declared more than once"
            )));
        }

        self.clusters
            .iter()
            .cartesian_product(DaemonKind::ALL)
            .find(|(cluster, kind)| {
                cluster.spec.health_check.daemon_health.get(*kind).interval_secs == Some(0)
            })
            .map_or(Ok(()), |(cluster, kind)| {
                Err(Error::invalid_config(format!(
                    "cluster '{}': {kind} health check interval must be positive",
                    cluster.namespace
                )))
            })
    }
}
