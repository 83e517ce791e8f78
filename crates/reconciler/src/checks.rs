//! Health check tasks.
//!
//! A [`HealthCheck`] is the background unit of work the launcher starts for a
//! daemon kind. [`PeriodicCheck`] is the stock implementation: it runs a
//! [`HealthProbe`] on a fixed cadence until its stop signal fires, tracking
//! whether the daemon is healthy and logging each transition.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use vigil_core::DaemonKind;

use crate::error::{Error, Result};
use crate::signal::StopSignal;

/// Default number of consecutive failed probes before a daemon is unhealthy.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = vigil_core::config::DEFAULT_FAILURE_THRESHOLD;

/// Default timeout for a single HTTP probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration =
    Duration::from_secs(vigil_core::config::DEFAULT_PROBE_TIMEOUT_SECS);

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    /// Whether the daemon answered healthy.
    pub is_healthy: bool,
    /// Status code from the probe (if available).
    pub status_code: Option<u16>,
    /// Error message if the probe failed.
    pub error: Option<String>,
    /// When the probe finished.
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Create a successful result.
    #[must_use]
    pub fn healthy(status_code: u16) -> Self {
        Self {
            is_healthy: true,
            status_code: Some(status_code),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed result.
    #[must_use]
    pub fn unhealthy(error: String) -> Self {
        Self {
            is_healthy: false,
            status_code: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Create a failed result with status code.
    #[must_use]
    pub fn unhealthy_with_status(status_code: u16, error: String) -> Self {
        Self {
            is_healthy: false,
            status_code: Some(status_code),
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}

/// Health as seen by a running check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// No probe has completed yet.
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    /// Convert to a string representation.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// One health observation of a daemon.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe once. Failures are reported in the result, never raised.
    async fn probe(&self) -> HealthCheckResult;
}

/// A background health check task.
#[async_trait]
pub trait HealthCheck: Send {
    /// Run until `stop` fires.
    async fn run(self: Box<Self>, stop: StopSignal);
}

/// Runs a probe every `interval` until stopped.
pub struct PeriodicCheck<P> {
    namespace: String,
    daemon: DaemonKind,
    interval: Duration,
    failure_threshold: u32,
    probe: P,
    status: HealthStatus,
    failure_count: u32,
}

impl<P: HealthProbe> PeriodicCheck<P> {
    /// Create a check for `daemon` of the cluster in `namespace`.
    pub fn new(namespace: impl Into<String>, daemon: DaemonKind, interval: Duration, probe: P) -> Self {
        Self {
            namespace: namespace.into(),
            daemon,
            interval,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            probe,
            status: HealthStatus::Unknown,
            failure_count: 0,
        }
    }

    /// Set the consecutive-failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Delay between probes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Fold one probe result into the tracked status.
    fn observe(&mut self, result: &HealthCheckResult) -> HealthStatus {
        if result.is_healthy {
            self.failure_count = 0;
            if self.status != HealthStatus::Healthy {
                info!(
                    namespace = %self.namespace,
                    daemon = %self.daemon,
                    from = self.status.as_str(),
                    "ceph daemon is healthy"
                );
                self.status = HealthStatus::Healthy;
            }
            return self.status;
        }

        self.failure_count = self.failure_count.saturating_add(1);
        let error = result.error.as_deref().unwrap_or("unknown");
        if self.failure_count >= self.failure_threshold && self.status != HealthStatus::Unhealthy {
            warn!(
                namespace = %self.namespace,
                daemon = %self.daemon,
                failures = self.failure_count,
                error,
                "ceph daemon is unhealthy"
            );
            self.status = HealthStatus::Unhealthy;
        } else {
            debug!(
                namespace = %self.namespace,
                daemon = %self.daemon,
                failures = self.failure_count,
                threshold = self.failure_threshold,
                error,
                "health probe failed"
            );
        }
        self.status
    }
}

#[async_trait]
impl<P: HealthProbe + 'static> HealthCheck for PeriodicCheck<P> {
    async fn run(self: Box<Self>, mut stop: StopSignal) {
        let mut check = *self;
        let mut ticker = tokio::time::interval(check.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            namespace = %check.namespace,
            daemon = %check.daemon,
            interval_secs = check.interval.as_secs(),
            signal = %stop.id(),
            "health check started"
        );

        loop {
            tokio::select! {
                biased;
                () = stop.stopped() => break,
                _ = ticker.tick() => {
                    let result = check.probe.probe().await;
                    check.observe(&result);
                }
            }
        }

        info!(
            namespace = %check.namespace,
            daemon = %check.daemon,
            signal = %stop.id(),
            "stopping ceph {} health check", check.daemon
        );
    }
}

/// Probes an HTTP health endpoint; any 2xx answer is healthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    /// Build a probe for `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ProbeFailed` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::probe_failed(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The probed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self) -> HealthCheckResult {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    HealthCheckResult::healthy(status.as_u16())
                } else {
                    HealthCheckResult::unhealthy_with_status(
                        status.as_u16(),
                        format!("HTTP {}", status.as_u16()),
                    )
                }
            }
            Err(e) => HealthCheckResult::unhealthy(format!("request failed: {e}")),
        }
    }
}
