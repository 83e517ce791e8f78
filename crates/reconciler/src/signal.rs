//! One-shot, level-triggered stop signals for background tasks.
//!
//! A [`StopHandle`] is owned by whoever may stop the task (a monitoring
//! record, or the cluster itself for auxiliary watchers). The task holds a
//! [`StopSignal`]. Once fired the signal stays fired, so a task that checks
//! late still sees it. Dropping the handle also counts as stopped.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use ulid::Ulid;

/// Identity of one stop signal. Every launch gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(Ulid);

impl SignalId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending side of a stop signal.
#[derive(Debug)]
pub struct StopHandle {
    id: SignalId,
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Create a new handle together with the signal its task observes.
    #[must_use]
    pub fn new() -> (Self, StopSignal) {
        let (tx, rx) = watch::channel(false);
        let id = SignalId::new();
        (Self { id, tx }, StopSignal { id, rx })
    }

    /// Identity of this signal.
    #[must_use]
    pub const fn id(&self) -> SignalId {
        self.id
    }

    /// Another receiver for the same signal.
    #[must_use]
    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            id: self.id,
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal.
    ///
    /// Returns `true` only for the call that actually fired it; later calls
    /// are no-ops. Never waits for the task to acknowledge.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    /// Whether the signal has been fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of a stop signal, held by the background task.
#[derive(Debug, Clone)]
pub struct StopSignal {
    id: SignalId,
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Identity of this signal.
    #[must_use]
    pub const fn id(&self) -> SignalId {
        self.id
    }

    /// Whether the task should stop now.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once the signal is fired or its handle is gone.
    pub async fn stopped(&mut self) {
        // Err means the handle was dropped, which also ends the task.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
