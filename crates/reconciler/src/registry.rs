//! Per-cluster monitoring registry.
//!
//! The registry is the supervisor's only mutable state. It is owned by a
//! [`crate::SupervisedCluster`] and only reachable through `&mut`, so a single
//! reconciliation pass is its only writer.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::warn;
use vigil_core::DaemonKind;

use crate::signal::{SignalId, StopHandle};
use crate::types::MonitoringState;

/// Runtime bookkeeping for one daemon kind of one cluster.
#[derive(Debug)]
pub struct MonitoringRecord {
    stop: StopHandle,
    running: bool,
    starts: u32,
}

impl MonitoringRecord {
    fn new(stop: StopHandle) -> Self {
        Self {
            stop,
            running: true,
            starts: 1,
        }
    }

    /// Whether a task is believed to be active. Not verified against the task.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Identity of the current (or last) stop signal.
    #[must_use]
    pub const fn signal(&self) -> SignalId {
        self.stop.id()
    }

    /// How many tasks have been launched into this slot.
    #[must_use]
    pub const fn starts(&self) -> u32 {
        self.starts
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> MonitoringState {
        if self.running {
            MonitoringState::Running
        } else {
            MonitoringState::Stopped
        }
    }
}

/// Map from daemon kind to its monitoring record.
#[derive(Debug, Default)]
pub struct MonitoringRegistry {
    records: BTreeMap<DaemonKind, MonitoringRecord>,
}

impl MonitoringRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for `daemon`.
    #[must_use]
    pub fn get(&self, daemon: DaemonKind) -> Option<&MonitoringRecord> {
        self.records.get(&daemon)
    }

    /// Lifecycle state of `daemon`.
    #[must_use]
    pub fn state(&self, daemon: DaemonKind) -> MonitoringState {
        self.records
            .get(&daemon)
            .map_or(MonitoringState::Absent, MonitoringRecord::state)
    }

    /// Record a freshly launched task for `daemon`.
    ///
    /// Creates the record on first use; otherwise reuses the slot and swaps in
    /// the new handle. A still-running predecessor is stopped first so that at
    /// most one task per kind is ever live.
    pub fn record_start(&mut self, daemon: DaemonKind, stop: StopHandle) -> &MonitoringRecord {
        match self.records.entry(daemon) {
            Entry::Occupied(entry) => {
                let record = entry.into_mut();
                if record.running && record.stop.fire() {
                    warn!(%daemon, signal = %record.stop.id(), "replaced a running health check");
                }
                record.stop = stop;
                record.running = true;
                record.starts = record.starts.saturating_add(1);
                record
            }
            Entry::Vacant(entry) => entry.insert(MonitoringRecord::new(stop)),
        }
    }

    /// Fire the stop signal of a running `daemon` and mark it stopped.
    ///
    /// Returns the fired signal, or `None` if nothing was running.
    pub fn record_stop(&mut self, daemon: DaemonKind) -> Option<SignalId> {
        let record = self.records.get_mut(&daemon).filter(|r| r.running)?;
        record.stop.fire();
        record.running = false;
        Some(record.stop.id())
    }

    /// Stop every running task. Returns what was stopped.
    pub fn stop_all(&mut self) -> Vec<(DaemonKind, SignalId)> {
        DaemonKind::ALL
            .into_iter()
            .filter_map(|daemon| self.record_stop(daemon).map(|signal| (daemon, signal)))
            .collect()
    }

    /// Number of kinds with a running task.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.records.values().filter(|r| r.running).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry_is_absent() {
        let registry = MonitoringRegistry::new();
        assert!(DaemonKind::ALL
            .iter()
            .all(|d| registry.state(*d) == MonitoringState::Absent));
    }

    #[test]
    fn test_start_then_stop() {
        let mut registry = MonitoringRegistry::new();
        let (handle, signal) = StopHandle::new();
        let id = handle.id();

        registry.record_start(DaemonKind::Mon, handle);
        assert_eq!(registry.state(DaemonKind::Mon), MonitoringState::Running);
        assert_eq!(registry.running_count(), 1);

        assert_eq!(registry.record_stop(DaemonKind::Mon), Some(id));
        assert_eq!(registry.state(DaemonKind::Mon), MonitoringState::Stopped);
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_stop_is_noop_when_not_running() {
        let mut registry = MonitoringRegistry::new();
        assert_eq!(registry.record_stop(DaemonKind::Osd), None);

        let (handle, _signal) = StopHandle::new();
        registry.record_start(DaemonKind::Osd, handle);
        assert!(registry.record_stop(DaemonKind::Osd).is_some());
        assert_eq!(registry.record_stop(DaemonKind::Osd), None);
    }

    #[test]
    fn test_restart_reuses_slot_with_new_signal() {
        let mut registry = MonitoringRegistry::new();
        let (first, first_signal) = StopHandle::new();
        let first_id = first.id();
        registry.record_start(DaemonKind::Status, first);
        registry.record_stop(DaemonKind::Status);

        let (second, second_signal) = StopHandle::new();
        let record = registry.record_start(DaemonKind::Status, second);

        assert_eq!(record.starts(), 2);
        assert_ne!(record.signal(), first_id);
        assert!(first_signal.is_stopped());
        assert!(!second_signal.is_stopped());
    }

    #[test]
    fn test_start_over_running_record_stops_predecessor() {
        let mut registry = MonitoringRegistry::new();
        let (first, first_signal) = StopHandle::new();
        registry.record_start(DaemonKind::Mon, first);

        let (second, second_signal) = StopHandle::new();
        registry.record_start(DaemonKind::Mon, second);

        assert!(first_signal.is_stopped());
        assert!(!second_signal.is_stopped());
        assert_eq!(registry.running_count(), 1);
    }

    #[test]
    fn test_stop_all_only_touches_running_records() {
        let mut registry = MonitoringRegistry::new();
        let (mon, mon_signal) = StopHandle::new();
        let (osd, osd_signal) = StopHandle::new();
        registry.record_start(DaemonKind::Mon, mon);
        registry.record_start(DaemonKind::Osd, osd);
        registry.record_stop(DaemonKind::Osd);

        let stopped = registry.stop_all();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped.first().map(|(d, _)| *d), Some(DaemonKind::Mon));
        assert!(mon_signal.is_stopped());
        assert!(osd_signal.is_stopped());
        assert_eq!(registry.running_count(), 0);
    }
}
