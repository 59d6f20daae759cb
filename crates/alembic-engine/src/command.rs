//! Commands queued for an engine, and the replies they produce.
//!
//! Commands travel over a bounded crossbeam channel and are applied by
//! the engine only between steps. Commands that produce a value carry a
//! one-shot reply channel; the caller holds the receiving [`Ticket`].

use std::fmt;
use std::time::Duration;

use alembic_core::{ControlError, Environment, Reaction, ReactionId, StatusKind, Step, Time};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::monitor::OutputMonitor;

/// Read-only summary of engine state handed to inspectors and monitors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineView {
    /// Current simulated time.
    pub now: Time,
    /// Steps completed.
    pub step: Step,
    /// Current status.
    pub status: StatusKind,
    /// Number of live reactions.
    pub reactions: usize,
}

/// Closure run against the environment at a step boundary.
pub(crate) type Inspector<E> = Box<dyn FnOnce(&E, &EngineView) + Send>;

/// A request applied by the engine at the next step boundary.
pub(crate) enum Command<E: Environment> {
    Play,
    Pause,
    Stop,
    GoToStep(Step),
    GoToTime(Time),
    AddReaction(Box<dyn Reaction<E>>, Sender<Option<ReactionId>>),
    RemoveReaction(ReactionId, Sender<bool>),
    Inspect(Inspector<E>),
    AddMonitor(Box<dyn OutputMonitor<E>>),
}

impl<E: Environment> fmt::Debug for Command<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play => write!(f, "Play"),
            Self::Pause => write!(f, "Pause"),
            Self::Stop => write!(f, "Stop"),
            Self::GoToStep(s) => write!(f, "GoToStep({s})"),
            Self::GoToTime(t) => write!(f, "GoToTime({t})"),
            Self::AddReaction(r, _) => write!(f, "AddReaction({})", r.name()),
            Self::RemoveReaction(id, _) => write!(f, "RemoveReaction({id})"),
            Self::Inspect(_) => write!(f, "Inspect"),
            Self::AddMonitor(_) => write!(f, "AddMonitor"),
        }
    }
}

/// Pending reply to a queued command.
///
/// Dropping a ticket is fine; the engine ignores closed reply channels.
#[derive(Debug)]
pub struct Ticket<T> {
    rx: Receiver<T>,
}

impl<T> Ticket<T> {
    pub(crate) fn channel() -> (Sender<T>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, Self { rx })
    }

    /// Block until the engine replies.
    ///
    /// Fails with [`ControlError::Disconnected`] if the engine terminated
    /// or was dropped before applying the command.
    pub fn wait(self) -> Result<T, ControlError> {
        self.rx.recv().map_err(|_| ControlError::Disconnected)
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, ControlError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => ControlError::Timeout,
            RecvTimeoutError::Disconnected => ControlError::Disconnected,
        })
    }

    /// The reply, if it has already arrived.
    pub fn try_get(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_receives_reply() {
        let (tx, ticket) = Ticket::channel();
        assert_eq!(ticket.try_get(), None);
        tx.send(5u32).unwrap();
        assert_eq!(ticket.wait(), Ok(5));
    }

    #[test]
    fn ticket_reports_dropped_sender() {
        let (tx, ticket) = Ticket::<u32>::channel();
        drop(tx);
        assert_eq!(
            ticket.wait_timeout(Duration::from_millis(10)),
            Err(ControlError::Disconnected)
        );
    }

    #[test]
    fn ticket_times_out() {
        let (_tx, ticket) = Ticket::<u32>::channel();
        assert_eq!(
            ticket.wait_timeout(Duration::from_millis(10)),
            Err(ControlError::Timeout)
        );
    }
}
