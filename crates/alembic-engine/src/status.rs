//! Shared, observable engine status.
//!
//! The engine thread writes the status; any number of controllers read it,
//! block on it, or subscribe to its transitions. Every transition is
//! validated against [`StatusKind::can_transition_to`] under the lock, so
//! observers never see an impossible sequence.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use alembic_core::{ControlError, EngineStatus, StatusKind, Step, Time};
use crossbeam_channel::{Receiver, Sender};

/// A status transition, as delivered to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusChange {
    /// Status before the transition.
    pub from: StatusKind,
    /// Status after the transition, with its error cause if any.
    pub to: EngineStatus,
    /// Steps completed when the transition happened.
    pub step: Step,
    /// Simulated time when the transition happened.
    pub time: Time,
}

struct Inner {
    status: EngineStatus,
    subscribers: Vec<Sender<StatusChange>>,
}

/// Engine status behind a mutex, with a condition variable for waiters.
pub struct StatusCell {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl StatusCell {
    /// A cell in [`EngineStatus::Ready`].
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: EngineStatus::Ready,
                subscribers: Vec::new(),
            }),
            changed: Condvar::new(),
        }
    }

    // A panicking subscriber cannot leave `Inner` half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The current status.
    pub fn get(&self) -> EngineStatus {
        self.lock().status.clone()
    }

    /// The current status kind.
    pub fn kind(&self) -> StatusKind {
        self.lock().status.kind()
    }

    /// Move to `next` if the lifecycle allows it.
    ///
    /// Returns `false`, leaving the status unchanged, for an invalid
    /// transition.
    pub fn transition(&self, next: EngineStatus, step: Step, time: Time) -> bool {
        let mut inner = self.lock();
        let from = inner.status.kind();
        if !from.can_transition_to(next.kind()) {
            return false;
        }
        tracing::debug!(%from, to = %next.kind(), %step, %time, "engine status changed");
        inner.status = next.clone();
        let change = StatusChange {
            from,
            to: next,
            step,
            time,
        };
        inner
            .subscribers
            .retain(|tx| tx.send(change.clone()).is_ok());
        drop(inner);
        self.changed.notify_all();
        true
    }

    /// Receive every future transition.
    pub fn subscribe(&self) -> Receiver<StatusChange> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Block until the status is `kind`, or until `timeout` expires.
    ///
    /// Fails early with [`ControlError::EngineTerminated`] if the engine
    /// reaches a different terminal status, since it can never leave it.
    pub fn wait_for(
        &self,
        kind: StatusKind,
        timeout: Duration,
    ) -> Result<EngineStatus, ControlError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            let current = inner.status.kind();
            if current == kind {
                return Ok(inner.status.clone());
            }
            if current.is_terminal() {
                return Err(ControlError::EngineTerminated { status: current });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ControlError::Timeout);
            }
            inner = match self.changed.wait_timeout(inner, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCell")
            .field("status", &self.get())
            .finish()
    }
}
