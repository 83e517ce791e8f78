//! Continuous reconciliation loop.
//!
//! The host side of the supervisor: on every tick it fetches the declared
//! clusters, starts supervising new ones, feeds updated specs to existing
//! ones, runs a reconciliation pass for each and tears down clusters that are
//! no longer declared.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use vigil_core::config::DEFAULT_RECONCILE_INTERVAL_SECS;
use vigil_core::{ClusterDeclaration, ResultExt, SupervisorConfig};

use crate::cluster::SupervisedCluster;
use crate::error::{Error, Result};
use crate::reconciler::MonitoringReconciler;
use crate::signal::{StopHandle, StopSignal};
use crate::types::{CephUser, MonitoringState, ReconcileResult};

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Interval between reconciliation ticks.
    pub interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
        }
    }
}

/// Source of the clusters that should be supervised.
#[async_trait]
pub trait DesiredStateProvider: Send + Sync {
    /// Get the current cluster declarations.
    async fn desired_clusters(&self) -> Result<Vec<ClusterDeclaration>>;
}

/// Simple in-memory desired state provider.
pub struct InMemoryDesiredStateProvider {
    clusters: RwLock<Vec<ClusterDeclaration>>,
}

impl InMemoryDesiredStateProvider {
    /// Create a new provider with initial declarations.
    pub fn new(clusters: Vec<ClusterDeclaration>) -> Self {
        Self {
            clusters: RwLock::new(clusters),
        }
    }

    /// Replace the declarations.
    pub async fn set(&self, clusters: Vec<ClusterDeclaration>) {
        *self.clusters.write().await = clusters;
    }

    /// Edit the declarations in place.
    pub async fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<ClusterDeclaration>),
    {
        let mut clusters = self.clusters.write().await;
        f(&mut clusters);
    }
}

#[async_trait]
impl DesiredStateProvider for InMemoryDesiredStateProvider {
    async fn desired_clusters(&self) -> Result<Vec<ClusterDeclaration>> {
        Ok(self.clusters.read().await.clone())
    }
}

/// Reads the declarations from a configuration file on every call.
#[derive(Debug, Clone)]
pub struct FileDesiredStateProvider {
    path: PathBuf,
}

impl FileDesiredStateProvider {
    /// Create a provider for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DesiredStateProvider for FileDesiredStateProvider {
    async fn desired_clusters(&self) -> Result<Vec<ClusterDeclaration>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| vigil_core::Error::file_read_failed(&self.path, e.to_string()))?;
        let config = SupervisorConfig::from_toml_str(&contents)?;
        Ok(config.clusters)
    }
}

/// A supervised cluster together with the identity it runs as.
#[derive(Debug)]
struct ManagedCluster {
    cluster: SupervisedCluster,
    user: CephUser,
}

/// Continuous reconciliation loop.
///
/// Owns every [`SupervisedCluster`], so it is the single writer of their
/// registries.
pub struct ReconciliationLoop {
    reconciler: Arc<MonitoringReconciler>,
    provider: Arc<dyn DesiredStateProvider>,
    config: LoopConfig,
    clusters: BTreeMap<String, ManagedCluster>,
    stop: Arc<StopHandle>,
    stop_signal: StopSignal,
}

impl ReconciliationLoop {
    /// Create a new reconciliation loop.
    pub fn new(
        reconciler: Arc<MonitoringReconciler>,
        provider: Arc<dyn DesiredStateProvider>,
        config: LoopConfig,
    ) -> Self {
        let (stop, stop_signal) = StopHandle::new();
        Self {
            reconciler,
            provider,
            config,
            clusters: BTreeMap::new(),
            stop: Arc::new(stop),
            stop_signal,
        }
    }

    /// Run until stopped, then tear every cluster down.
    ///
    /// A tick whose declarations cannot be fetched is logged and skipped;
    /// monitoring already running keeps running.
    ///
    /// # Errors
    ///
    /// Currently never fails; the signature leaves room for fatal host errors.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "starting reconciliation loop"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop = self.stop_signal.clone();

        loop {
            tokio::select! {
                biased;
                () = stop.stopped() => break,
                _ = ticker.tick() => {
                    let _ = self
                        .run_once()
                        .await
                        .into_option_logged("reconciliation tick skipped");
                }
            }
        }

        let torn_down = self.shutdown();
        info!(clusters = torn_down, "reconciliation loop stopped");
        Ok(())
    }

    /// Run a single reconciliation tick.
    ///
    /// # Errors
    ///
    /// Returns `LoopStopped` once the loop was stopped, or the provider's
    /// error if the declarations could not be fetched. Nothing is changed in
    /// either case.
    pub async fn run_once(&mut self) -> Result<Vec<ReconcileResult>> {
        if self.stop.is_fired() {
            return Err(Error::LoopStopped);
        }

        let desired: BTreeMap<String, ClusterDeclaration> = self
            .provider
            .desired_clusters()
            .await?
            .into_iter()
            .map(|declaration| (declaration.namespace.clone(), declaration))
            .collect();

        let removed: Vec<String> = self
            .clusters
            .keys()
            .filter(|namespace| !desired.contains_key(*namespace))
            .cloned()
            .collect();
        for namespace in removed {
            if let Some(mut managed) = self.clusters.remove(&namespace) {
                info!(%namespace, "cluster no longer declared, tearing down");
                managed.cluster.teardown();
            }
        }

        let mut results = Vec::with_capacity(desired.len());
        for (namespace, declaration) in desired {
            let user = CephUser::new(declaration.ceph_user);
            let managed = match self.clusters.entry(namespace) {
                Entry::Occupied(entry) => {
                    let managed = entry.into_mut();
                    managed.cluster.update_spec(declaration.spec);
                    managed.user = user;
                    managed
                }
                Entry::Vacant(entry) => {
                    let namespace = entry.key().clone();
                    info!(%namespace, %user, "supervising new cluster");
                    entry.insert(ManagedCluster {
                        cluster: SupervisedCluster::new(namespace, declaration.spec),
                        user,
                    })
                }
            };
            results.push(
                self.reconciler
                    .configure_monitoring(&mut managed.cluster, &managed.user),
            );
            debug!(
                namespace = %managed.cluster.namespace(),
                monitoring = %managed.cluster.status_summary(),
                "cluster monitoring state"
            );
        }

        debug!(
            clusters = results.len(),
            converged = results.iter().filter(|r| r.converged).count(),
            "reconciliation tick complete"
        );
        Ok(results)
    }

    /// Tear down every supervised cluster. Returns how many there were.
    pub fn shutdown(&mut self) -> usize {
        let clusters = std::mem::take(&mut self.clusters);
        let count = clusters.len();
        for (_, mut managed) in clusters {
            managed.cluster.teardown();
        }
        count
    }

    /// Namespaces currently supervised.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }

    /// A supervised cluster by namespace.
    #[must_use]
    pub fn cluster(&self, namespace: &str) -> Option<&SupervisedCluster> {
        self.clusters.get(namespace).map(|managed| &managed.cluster)
    }

    /// Per-kind monitoring state of every supervised cluster.
    #[must_use]
    pub fn status(&self) -> Vec<(String, Vec<(vigil_core::DaemonKind, MonitoringState)>)> {
        self.clusters
            .iter()
            .map(|(namespace, managed)| (namespace.clone(), managed.cluster.monitoring_status()))
            .collect()
    }

    /// Get a stopper handle.
    #[must_use]
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop: Arc::clone(&self.stop),
        }
    }
}

/// Handle to stop a reconciliation loop.
#[derive(Debug, Clone)]
pub struct LoopStopper {
    stop: Arc<StopHandle>,
}

impl LoopStopper {
    /// Stop the loop. Later calls are no-ops.
    pub fn stop(&self) {
        if self.stop.fire() {
            info!("reconciliation loop stop requested");
        }
    }
}
