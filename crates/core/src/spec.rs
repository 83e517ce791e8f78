//! Desired-state model for a supervised storage cluster.
//!
//! A [`ClusterSpec`] is a read-only snapshot: the reconciler reads it once per
//! pass and never writes it back.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default cadence of the monitor quorum check.
pub const DEFAULT_MON_INTERVAL: Duration = Duration::from_secs(45);

/// Default cadence of the OSD health check.
pub const DEFAULT_OSD_INTERVAL: Duration = Duration::from_secs(60);

/// Default cadence of the overall cluster status check.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// The closed set of daemon kinds that can be health-monitored.
///
/// Adding a kind means extending this enum, [`DaemonHealthSpec::get`] and the
/// launcher dispatch together; every one of them matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonKind {
    /// Monitor daemons (quorum).
    Mon,
    /// Object storage daemons.
    Osd,
    /// Overall cluster status.
    Status,
}

impl DaemonKind {
    /// Every kind, in reconciliation order.
    pub const ALL: [Self; 3] = [Self::Mon, Self::Osd, Self::Status];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Osd => "osd",
            Self::Status => "status",
        }
    }

    /// Default check interval for the kind.
    #[must_use]
    pub const fn default_interval(self) -> Duration {
        match self {
            Self::Mon => DEFAULT_MON_INTERVAL,
            Self::Osd => DEFAULT_OSD_INTERVAL,
            Self::Status => DEFAULT_STATUS_INTERVAL,
        }
    }
}

impl fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DaemonKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::unknown_daemon(s))
    }
}

/// Health check settings for one daemon kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonHealthCheck {
    /// Whether monitoring of this daemon kind is switched off.
    pub disabled: bool,
    /// Check cadence in seconds; the kind's default applies when unset.
    pub interval_secs: Option<u64>,
}

impl DaemonHealthCheck {
    /// A check that is switched off.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            disabled: true,
            interval_secs: None,
        }
    }

    /// Resolve the effective cadence for `kind`.
    #[must_use]
    pub fn interval(&self, kind: DaemonKind) -> Duration {
        self.interval_secs
            .map_or_else(|| kind.default_interval(), Duration::from_secs)
    }
}

/// Per-daemon health check settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonHealthSpec {
    pub mon: DaemonHealthCheck,
    pub osd: DaemonHealthCheck,
    pub status: DaemonHealthCheck,
}

impl DaemonHealthSpec {
    /// Settings for `kind`.
    #[must_use]
    pub const fn get(&self, kind: DaemonKind) -> &DaemonHealthCheck {
        match kind {
            DaemonKind::Mon => &self.mon,
            DaemonKind::Osd => &self.osd,
            DaemonKind::Status => &self.status,
        }
    }

    /// Mutable settings for `kind`.
    pub fn get_mut(&mut self, kind: DaemonKind) -> &mut DaemonHealthCheck {
        match kind {
            DaemonKind::Mon => &mut self.mon,
            DaemonKind::Osd => &mut self.osd,
            DaemonKind::Status => &mut self.status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckSpec {
    pub daemon_health: DaemonHealthSpec,
}

/// Health endpoints probed for each daemon kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonEndpoints {
    pub mon: Option<String>,
    pub osd: Option<String>,
    pub status: Option<String>,
}

impl DaemonEndpoints {
    /// Endpoint for `kind`, if configured.
    #[must_use]
    pub fn get(&self, kind: DaemonKind) -> Option<&str> {
        match kind {
            DaemonKind::Mon => self.mon.as_deref(),
            DaemonKind::Osd => self.osd.as_deref(),
            DaemonKind::Status => self.status.as_deref(),
        }
    }
}

/// Desired state of one storage cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSpec {
    pub health_check: HealthCheckSpec,
    /// Ask the OSD check to remove OSDs that are out and safe to destroy.
    /// The HTTP OSD check only reports this flag; it never removes anything.
    pub remove_osds_if_out_and_safe_to_remove: bool,
    pub endpoints: DaemonEndpoints,
}

impl ClusterSpec {
    /// Create a spec with every daemon kind monitored.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether monitoring of `kind` is switched off.
    #[must_use]
    pub const fn is_monitoring_disabled(&self, kind: DaemonKind) -> bool {
        self.health_check.daemon_health.get(kind).disabled
    }

    /// Effective check cadence for `kind`.
    #[must_use]
    pub fn check_interval(&self, kind: DaemonKind) -> Duration {
        self.health_check.daemon_health.get(kind).interval(kind)
    }

    /// Builder-style toggle used by hosts and tests.
    #[must_use]
    pub fn with_monitoring_disabled(mut self, kind: DaemonKind, disabled: bool) -> Self {
        self.health_check.daemon_health.get_mut(kind).disabled = disabled;
        self
    }
}
