//! Error types for the reconciler crate.

use thiserror::Error;
use vigil_core::DaemonKind;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// None of these are fatal to the host: at worst monitoring for one daemon
/// kind is not running until a later pass succeeds.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A health check task could not be constructed or started.
    #[error("failed to launch {daemon} health check: {reason}")]
    LaunchFailed { daemon: DaemonKind, reason: String },

    /// An auxiliary watcher could not be started.
    #[error("failed to start {watcher}: {reason}")]
    WatcherFailed { watcher: String, reason: String },

    /// A health probe could not be built.
    #[error("health probe failed: {reason}")]
    ProbeFailed { reason: String },

    /// The desired state could not be obtained.
    #[error("desired state unavailable: {reason}")]
    StateFailed { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Loop was stopped.
    #[error("reconciliation loop stopped")]
    LoopStopped,
}

impl Error {
    /// Create a launch failed error.
    pub fn launch_failed(daemon: DaemonKind, reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            daemon,
            reason: reason.into(),
        }
    }

    /// Create a watcher failed error.
    pub fn watcher_failed(watcher: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WatcherFailed {
            watcher: watcher.into(),
            reason: reason.into(),
        }
    }

    /// Create a probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Create a state failed error.
    pub fn state_failed(reason: impl Into<String>) -> Self {
        Self::StateFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl From<vigil_core::Error> for Error {
    fn from(err: vigil_core::Error) -> Self {
        match err {
            vigil_core::Error::InvalidConfig { reason } => Self::InvalidConfig { reason },
            other => Self::state_failed(other.to_string()),
        }
    }
}
