//! Task launcher: builds the daemon-specific health check and starts it.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vigil_core::DaemonKind;

use crate::checks::{DEFAULT_PROBE_TIMEOUT, HealthCheck, HttpProbe, PeriodicCheck};
use crate::error::{Error, Result};
use crate::signal::StopHandle;
use crate::types::{CephUser, ClusterContext};

/// Starts the background health check for one daemon kind.
pub trait TaskLauncher: Send + Sync {
    /// Start the check and hand back the stop handle that now owns it.
    ///
    /// Must not block: the task runs in the background. On error nothing was
    /// started.
    ///
    /// # Errors
    ///
    /// Returns `LaunchFailed` if the check could not be constructed or there
    /// is nothing to run it on.
    fn launch(&self, daemon: DaemonKind, cluster: &ClusterContext, user: &CephUser)
    -> Result<StopHandle>;
}

/// Constructors for each daemon kind's health check.
pub trait CheckerFactory: Send + Sync {
    /// Monitor quorum check.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be built for this cluster.
    fn monitor_checker(&self, cluster: &ClusterContext) -> Result<Box<dyn HealthCheck>>;

    /// OSD health check.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be built for this cluster.
    fn osd_checker(&self, cluster: &ClusterContext) -> Result<Box<dyn HealthCheck>>;

    /// Overall cluster status check, run as `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be built for this cluster.
    fn status_checker(
        &self,
        cluster: &ClusterContext,
        user: &CephUser,
    ) -> Result<Box<dyn HealthCheck>>;
}

/// Launcher that dispatches to a [`CheckerFactory`] and spawns on tokio.
pub struct CheckLauncher<F> {
    factory: F,
}

impl<F: CheckerFactory> CheckLauncher<F> {
    /// Create a launcher over `factory`.
    pub const fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Build the check for `daemon` and spawn it on the current tokio runtime.
    ///
    /// Returns the stop handle that owns the task together with its join handle.
    ///
    /// # Errors
    ///
    /// Returns `LaunchFailed` if the check cannot be built or the caller is not
    /// inside a tokio runtime. Nothing is spawned in either case.
    pub fn spawn_check(
        &self,
        daemon: DaemonKind,
        cluster: &ClusterContext,
        user: &CephUser,
    ) -> Result<(StopHandle, JoinHandle<()>)> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::launch_failed(daemon, format!("no tokio runtime to run the check on: {e}"))
        })?;

        let checker = match daemon {
            DaemonKind::Mon => self.factory.monitor_checker(cluster),
            DaemonKind::Osd => self.factory.osd_checker(cluster),
            DaemonKind::Status => self.factory.status_checker(cluster, user),
        }
        .map_err(|e| match e {
            Error::LaunchFailed { .. } => e,
            other => Error::launch_failed(daemon, other.to_string()),
        })?;

        let (handle, signal) = StopHandle::new();
        info!(
            namespace = %cluster.namespace,
            %daemon,
            signal = %handle.id(),
            "enabling ceph {daemon} monitoring task"
        );
        let task = runtime.spawn(checker.run(signal));
        Ok((handle, task))
    }
}

impl<F: CheckerFactory> TaskLauncher for CheckLauncher<F> {
    fn launch(
        &self,
        daemon: DaemonKind,
        cluster: &ClusterContext,
        user: &CephUser,
    ) -> Result<StopHandle> {
        // The task is detached; the stop handle is what controls it.
        self.spawn_check(daemon, cluster, user)
            .map(|(handle, _task)| handle)
    }
}

/// Builds [`PeriodicCheck`]s over the HTTP endpoints declared in the cluster spec.
#[derive(Debug, Clone)]
pub struct HttpCheckerFactory {
    timeout: Duration,
    failure_threshold: u32,
}

impl Default for HttpCheckerFactory {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            failure_threshold: crate::checks::DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl HttpCheckerFactory {
    /// Create a factory with default probe settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the consecutive-failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    fn periodic_check(
        &self,
        daemon: DaemonKind,
        cluster: &ClusterContext,
    ) -> Result<PeriodicCheck<HttpProbe>> {
        let url = cluster.spec.endpoints.get(daemon).ok_or_else(|| {
            Error::launch_failed(
                daemon,
                format!("no {daemon} endpoint declared for cluster '{}'", cluster.namespace),
            )
        })?;
        let probe = HttpProbe::new(url, self.timeout)?;
        debug!(
            namespace = %cluster.namespace,
            %daemon,
            url = probe.url(),
            timeout_ms = self.timeout.as_millis(),
            "building HTTP health check"
        );
        Ok(PeriodicCheck::new(
            cluster.namespace.clone(),
            daemon,
            cluster.spec.check_interval(daemon),
            probe,
        )
        .with_failure_threshold(self.failure_threshold))
    }

    fn build(&self, daemon: DaemonKind, cluster: &ClusterContext) -> Result<Box<dyn HealthCheck>> {
        let check = self.periodic_check(daemon, cluster)?;
        Ok(Box::new(check))
    }
}

impl CheckerFactory for HttpCheckerFactory {
    fn monitor_checker(&self, cluster: &ClusterContext) -> Result<Box<dyn HealthCheck>> {
        self.build(DaemonKind::Mon, cluster)
    }

    fn osd_checker(&self, cluster: &ClusterContext) -> Result<Box<dyn HealthCheck>> {
        // Removal of out OSDs needs the orchestrator; over HTTP the flag is
        // only reported.
        if cluster.spec.remove_osds_if_out_and_safe_to_remove {
            info!(
                namespace = %cluster.namespace,
                "automatic OSD removal is requested but the HTTP check only reports health"
            );
        }
        self.build(DaemonKind::Osd, cluster)
    }

    fn status_checker(
        &self,
        cluster: &ClusterContext,
        user: &CephUser,
    ) -> Result<Box<dyn HealthCheck>> {
        debug!(namespace = %cluster.namespace, %user, "building ceph status check");
        self.build(DaemonKind::Status, cluster)
    }
}
