//! Desired-state resolution: is monitoring of a daemon switched off?

use tracing::warn;
use vigil_core::{ClusterSpec, DaemonKind};

/// Whether monitoring of the daemon named `daemon` is disabled in `spec`.
///
/// Names outside the known set resolve to *not disabled*: a config written for
/// a newer or older schema keeps monitoring on rather than silently off.
#[must_use]
pub fn is_monitoring_disabled(daemon: &str, spec: &ClusterSpec) -> bool {
    daemon.parse::<DaemonKind>().map_or_else(
        |err| {
            warn!(daemon, error = %err, "treating monitoring of unknown daemon as enabled");
            false
        },
        |kind| spec.is_monitoring_disabled(kind),
    )
}
