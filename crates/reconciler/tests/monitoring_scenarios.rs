//! BDD-style behavioral tests for monitoring reconciliation.
//!
//! These tests drive `configure_monitoring` with recording fakes for the task
//! launcher and the watcher launcher, following the Given-When-Then pattern.

#![allow(clippy::expect_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use std::sync::{Arc, Mutex};

use vigil_core::{ClusterSpec, DaemonKind};
use vigil_reconciler::{
    CephUser, ClusterContext, Error, MonitoringReconciler, MonitoringState, ReconcileAction,
    Result, SignalId, StopHandle, StopSignal, SupervisedCluster, TaskLauncher, WatcherLauncher,
    is_monitoring_disabled,
};

/// One recorded launch: the kind and the signal its task observes.
#[derive(Clone)]
struct Launch {
    daemon: DaemonKind,
    signal: StopSignal,
}

/// Launcher that records every launch instead of spawning work.
#[derive(Default)]
struct RecordingLauncher {
    launches: Mutex<Vec<Launch>>,
    failing: Mutex<Vec<DaemonKind>>,
}

impl RecordingLauncher {
    fn launches_of(&self, daemon: DaemonKind) -> Vec<Launch> {
        self.launches
            .lock()
            .expect("launch log poisoned")
            .iter()
            .filter(|launch| launch.daemon == daemon)
            .cloned()
            .collect()
    }

    fn total(&self) -> usize {
        self.launches.lock().expect("launch log poisoned").len()
    }

    fn fail(&self, daemon: DaemonKind) {
        self.failing.lock().expect("failure list poisoned").push(daemon);
    }

    fn recover(&self) {
        self.failing.lock().expect("failure list poisoned").clear();
    }
}

impl TaskLauncher for RecordingLauncher {
    fn launch(
        &self,
        daemon: DaemonKind,
        _cluster: &ClusterContext,
        _user: &CephUser,
    ) -> Result<StopHandle> {
        if self.failing.lock().expect("failure list poisoned").contains(&daemon) {
            return Err(Error::launch_failed(daemon, "checker constructor failed"));
        }
        let (handle, signal) = StopHandle::new();
        self.launches
            .lock()
            .expect("launch log poisoned")
            .push(Launch { daemon, signal });
        Ok(handle)
    }
}

/// Watcher launcher that counts starts and keeps the signals it was given.
#[derive(Default)]
struct RecordingWatchers {
    client: Mutex<Vec<StopSignal>>,
    bucket: Mutex<Vec<StopSignal>>,
}

impl WatcherLauncher for RecordingWatchers {
    fn start_client_watcher(&self, _cluster: &ClusterContext, stop: StopSignal) -> Result<()> {
        self.client.lock().expect("client log poisoned").push(stop);
        Ok(())
    }

    fn start_bucket_provisioner(
        &self,
        _cluster: &ClusterContext,
        _user: &CephUser,
        stop: StopSignal,
    ) -> Result<()> {
        self.bucket.lock().expect("bucket log poisoned").push(stop);
        Ok(())
    }
}

struct Harness {
    launcher: Arc<RecordingLauncher>,
    watchers: Arc<RecordingWatchers>,
    reconciler: MonitoringReconciler,
    user: CephUser,
}

impl Harness {
    fn new() -> Self {
        let launcher = Arc::new(RecordingLauncher::default());
        let watchers = Arc::new(RecordingWatchers::default());
        let reconciler = MonitoringReconciler::new(launcher.clone(), watchers.clone());
        Self {
            launcher,
            watchers,
            reconciler,
            user: CephUser::new("client.admin"),
        }
    }

    fn pass(&self, cluster: &mut SupervisedCluster) -> vigil_reconciler::ReconcileResult {
        self.reconciler.configure_monitoring(cluster, &self.user)
    }
}

fn spec_with(disabled: &[DaemonKind]) -> ClusterSpec {
    disabled.iter().fold(ClusterSpec::new(), |spec, kind| {
        spec.with_monitoring_disabled(*kind, true)
    })
}

fn signal_of(cluster: &SupervisedCluster, daemon: DaemonKind) -> Option<SignalId> {
    cluster.registry().get(daemon).map(|record| record.signal())
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDEMPOTENCE
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN a cluster reconciled once with every kind enabled
/// WHEN the same spec is reconciled again
/// THEN nothing is launched, stopped or replaced
#[tokio::test]
async fn given_unchanged_spec_when_reconciled_twice_then_second_pass_has_no_effect() {
    // Given: one pass over the default spec
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", ClusterSpec::new());
    harness.pass(&mut cluster);
    let before: Vec<_> = DaemonKind::ALL
        .iter()
        .map(|kind| signal_of(&cluster, *kind))
        .collect();

    // When: reconcile again
    let result = harness.pass(&mut cluster);

    // Then: converged with identical bookkeeping
    assert!(result.converged);
    assert_eq!(harness.launcher.total(), 3);
    let after: Vec<_> = DaemonKind::ALL
        .iter()
        .map(|kind| signal_of(&cluster, *kind))
        .collect();
    assert_eq!(before, after);
    assert!(
        harness
            .launcher
            .launches
            .lock()
            .expect("launch log poisoned")
            .iter()
            .all(|launch| !launch.signal.is_stopped())
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// AT MOST ONE TASK PER KIND
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN a running OSD check
/// WHEN OSD monitoring is disabled and then enabled again
/// THEN the first task's signal fires exactly once, before the second launch
#[tokio::test]
async fn given_running_check_when_disabled_then_enabled_then_first_stops_before_second_starts() {
    // Given: OSD running
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", ClusterSpec::new());
    harness.pass(&mut cluster);

    // When: disable, then re-enable
    cluster.update_spec(spec_with(&[DaemonKind::Osd]));
    let stop_pass = harness.pass(&mut cluster);
    let first = harness.launcher.launches_of(DaemonKind::Osd);
    assert_eq!(first.len(), 1);
    assert!(first[0].signal.is_stopped(), "stopped before any relaunch");

    cluster.update_spec(ClusterSpec::new());
    harness.pass(&mut cluster);

    // Then: exactly one stop action, and only the second task is live
    let stops = stop_pass
        .actions_taken
        .iter()
        .filter(|action| matches!(action, ReconcileAction::StopMonitoring { .. }))
        .count();
    assert_eq!(stops, 1);
    let launches = harness.launcher.launches_of(DaemonKind::Osd);
    assert_eq!(launches.len(), 2);
    assert!(launches[0].signal.is_stopped());
    assert!(!launches[1].signal.is_stopped());
    assert_eq!(cluster.registry().running_count(), 3);
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAIL-OPEN RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN a spec that disables every known kind
/// WHEN an identifier outside the known set is resolved
/// THEN it is reported as not disabled
#[test]
fn given_unknown_daemon_when_resolved_then_monitoring_is_not_disabled() {
    let spec = spec_with(&DaemonKind::ALL);

    assert!(!is_monitoring_disabled("rgw", &spec));
    assert!(!is_monitoring_disabled("", &spec));
    assert!(is_monitoring_disabled("mon", &spec));
}

// ═══════════════════════════════════════════════════════════════════════════════
// ONE-SHOT WATCHER ACTIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN a fresh cluster
/// WHEN it is reconciled many times with changing specs
/// THEN each watcher is started exactly once, bound to the cluster signal
#[tokio::test]
async fn given_many_passes_when_reconciled_then_watchers_start_once() {
    // Given: a fresh cluster
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", ClusterSpec::new());

    // When: ten passes, toggling monitoring on and off
    for pass in 0..10 {
        let disabled: &[DaemonKind] = if pass % 2 == 0 { &[] } else { &DaemonKind::ALL };
        cluster.update_spec(spec_with(disabled));
        harness.pass(&mut cluster);
    }

    // Then: one client watcher and one bucket provisioner
    let client = harness.watchers.client.lock().expect("client log poisoned");
    let bucket = harness.watchers.bucket.lock().expect("bucket log poisoned");
    assert_eq!(client.len(), 1);
    assert_eq!(bucket.len(), 1);
    assert!(cluster.watchers_activated());

    // And: they follow the cluster, not the health checks
    assert!(!client[0].is_stopped());
    cluster.teardown();
    assert!(client[0].is_stopped());
    assert!(bucket[0].is_stopped());
}

/// GIVEN a spec with every kind disabled
/// WHEN the cluster is reconciled for the first time
/// THEN the watchers still start
#[tokio::test]
async fn given_everything_disabled_when_first_pass_then_watchers_still_start() {
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", spec_with(&DaemonKind::ALL));

    let result = harness.pass(&mut cluster);

    assert_eq!(result.actions_taken, vec![ReconcileAction::ActivateWatchers]);
    assert_eq!(harness.launcher.total(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORD PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN a status check that was started and then stopped
/// WHEN status monitoring is enabled again
/// THEN the same slot is reused with a new, distinct signal
#[tokio::test]
async fn given_stopped_record_when_reenabled_then_slot_reused_with_new_signal() {
    // Given: status started, then stopped
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", ClusterSpec::new());
    harness.pass(&mut cluster);
    let first = signal_of(&cluster, DaemonKind::Status).expect("status record");
    cluster.update_spec(spec_with(&[DaemonKind::Status]));
    harness.pass(&mut cluster);
    assert_eq!(
        cluster.registry().state(DaemonKind::Status),
        MonitoringState::Stopped
    );

    // When: re-enabled
    cluster.update_spec(ClusterSpec::new());
    let result = harness.pass(&mut cluster);

    // Then: a restart into the same slot under a new signal
    let record = cluster.registry().get(DaemonKind::Status).expect("status record");
    assert!(record.is_running());
    assert_eq!(record.starts(), 2);
    assert_ne!(record.signal(), first);
    assert!(matches!(
        result.actions_taken.as_slice(),
        [ReconcileAction::RestartMonitoring { daemon: DaemonKind::Status, signal }] if *signal == record.signal()
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// MIXED TRANSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN mon on, osd off, status on
/// WHEN the cluster spec changes to mon off, osd on, status on
/// THEN mon's signal fires once, osd goes absent to running, status is untouched
#[tokio::test]
async fn given_mixed_spec_when_flipped_then_each_kind_follows_its_own_transition() {
    // Given: {mon on, osd off, status on}
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", spec_with(&[DaemonKind::Osd]));
    harness.pass(&mut cluster);
    assert_eq!(cluster.registry().state(DaemonKind::Osd), MonitoringState::Absent);
    let status_signal = signal_of(&cluster, DaemonKind::Status);

    // When: {mon off, osd on, status on}
    cluster.update_spec(spec_with(&[DaemonKind::Mon]));
    let result = harness.pass(&mut cluster);

    // Then: mon stopped once
    let mon = harness.launcher.launches_of(DaemonKind::Mon);
    assert_eq!(mon.len(), 1);
    assert!(mon[0].signal.is_stopped());
    assert_eq!(cluster.registry().state(DaemonKind::Mon), MonitoringState::Stopped);
    assert_eq!(result.actions_for(DaemonKind::Mon).count(), 1);

    // And: osd started for the first time
    assert_eq!(harness.launcher.launches_of(DaemonKind::Osd).len(), 1);
    assert!(matches!(
        result.actions_for(DaemonKind::Osd).next(),
        Some(ReconcileAction::StartMonitoring { .. })
    ));
    assert_eq!(cluster.registry().state(DaemonKind::Osd), MonitoringState::Running);

    // And: status untouched
    assert_eq!(result.actions_for(DaemonKind::Status).count(), 0);
    assert_eq!(signal_of(&cluster, DaemonKind::Status), status_signal);
    assert_eq!(harness.launcher.launches_of(DaemonKind::Status).len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAUNCH FAILURES
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN a mon checker that cannot be constructed
/// WHEN the cluster is reconciled
/// THEN the failure is reported, mon stays absent, and the next pass retries
#[tokio::test]
async fn given_failing_launch_when_reconciled_then_kind_stays_absent_until_retry_succeeds() {
    // Given: mon launches fail
    let harness = Harness::new();
    harness.launcher.fail(DaemonKind::Mon);
    let mut cluster = SupervisedCluster::new("rook-ceph", ClusterSpec::new());

    // When: first pass
    let failed = harness.pass(&mut cluster);

    // Then: reported and left absent, others unaffected
    assert!(matches!(
        failed.actions_failed.as_slice(),
        [Error::LaunchFailed { daemon: DaemonKind::Mon, .. }]
    ));
    assert_eq!(cluster.registry().state(DaemonKind::Mon), MonitoringState::Absent);
    assert_eq!(cluster.registry().running_count(), 2);

    // And: the retry succeeds once the checker recovers
    harness.launcher.recover();
    let retried = harness.pass(&mut cluster);
    assert!(retried.all_succeeded());
    assert_eq!(cluster.registry().state(DaemonKind::Mon), MonitoringState::Running);
    assert_eq!(harness.launcher.launches_of(DaemonKind::Mon).len(), 1);
}

/// GIVEN a stopped osd check whose restart fails
/// WHEN the cluster is reconciled
/// THEN the record stays stopped with its old, fired signal
#[tokio::test]
async fn given_failing_restart_when_reconciled_then_record_stays_stopped() {
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", ClusterSpec::new());
    harness.pass(&mut cluster);
    cluster.update_spec(spec_with(&[DaemonKind::Osd]));
    harness.pass(&mut cluster);
    let stopped_signal = signal_of(&cluster, DaemonKind::Osd);

    harness.launcher.fail(DaemonKind::Osd);
    cluster.update_spec(ClusterSpec::new());
    let result = harness.pass(&mut cluster);

    assert_eq!(result.actions_failed.len(), 1);
    assert_eq!(cluster.registry().state(DaemonKind::Osd), MonitoringState::Stopped);
    assert_eq!(signal_of(&cluster, DaemonKind::Osd), stopped_signal);
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEARDOWN
// ═══════════════════════════════════════════════════════════════════════════════

/// GIVEN a cluster with every kind running
/// WHEN it is torn down
/// THEN every outstanding signal fires and later passes start nothing
#[tokio::test]
async fn given_running_cluster_when_torn_down_then_everything_stops_for_good() {
    let harness = Harness::new();
    let mut cluster = SupervisedCluster::new("rook-ceph", ClusterSpec::new());
    harness.pass(&mut cluster);

    let stopped = cluster.teardown();
    let again = harness.pass(&mut cluster);

    assert_eq!(stopped.len(), 3);
    assert!(
        harness
            .launcher
            .launches
            .lock()
            .expect("launch log poisoned")
            .iter()
            .all(|launch| launch.signal.is_stopped())
    );
    assert!(again.converged);
    assert_eq!(harness.launcher.total(), 3);
    assert!(cluster.teardown().is_empty());
}
