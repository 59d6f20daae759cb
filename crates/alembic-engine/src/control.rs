//! External control surface.
//!
//! [`EngineHandle`] is the only way other threads interact with an engine.
//! Every call enqueues a command; nothing touches engine state directly.
//! Calls on an engine in a terminal status fail with
//! [`ControlError::EngineTerminated`], except `stop`, which is idempotent.

use std::sync::Arc;
use std::time::Duration;

use alembic_core::{
    ControlError, EngineStatus, Environment, Reaction, ReactionId, StatusKind, Step, StepError,
    Time,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::command::{Command, EngineView, Ticket};
use crate::monitor::OutputMonitor;
use crate::status::{StatusCell, StatusChange};

/// Cloneable, thread-safe remote control for one engine.
pub struct EngineHandle<E: Environment> {
    commands: Sender<Command<E>>,
    status: Arc<StatusCell>,
    // Keeps an idle `Engine::run` waiting for commands.
    controller: Arc<()>,
}

impl<E: Environment> Clone for EngineHandle<E> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            status: Arc::clone(&self.status),
            controller: Arc::clone(&self.controller),
        }
    }
}

impl<E: Environment> std::fmt::Debug for EngineHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("status", &self.status.kind())
            .field("queued", &self.commands.len())
            .finish()
    }
}

impl<E: Environment> EngineHandle<E> {
    pub(crate) fn new(
        commands: Sender<Command<E>>,
        status: Arc<StatusCell>,
        controller: Arc<()>,
    ) -> Self {
        Self {
            commands,
            status,
            controller,
        }
    }

    fn send(&self, command: Command<E>) -> Result<(), ControlError> {
        let status = self.status.kind();
        if status.is_terminal() {
            return Err(ControlError::EngineTerminated { status });
        }
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(cmd) => {
                tracing::warn!(command = ?cmd, "command queue full, command dropped");
                ControlError::QueueFull
            }
            TrySendError::Disconnected(_) => ControlError::Disconnected,
        })
    }

    /// Start or resume execution.
    pub fn play(&self) -> Result<(), ControlError> {
        self.send(Command::Play)
    }

    /// Suspend at the next step boundary.
    pub fn pause(&self) -> Result<(), ControlError> {
        self.send(Command::Pause)
    }

    /// Discard the remaining schedule and terminate.
    ///
    /// Stopping an already-terminal engine is a no-op.
    pub fn stop(&self) -> Result<(), ControlError> {
        match self.send(Command::Stop) {
            Err(ControlError::EngineTerminated { .. }) => Ok(()),
            other => other,
        }
    }

    /// Blocking stop used during shutdown. Waits for queue space instead of
    /// failing with [`ControlError::QueueFull`].
    pub(crate) fn force_stop(&self) {
        if !self.status.kind().is_terminal() {
            let _ = self.commands.send(Command::Stop);
        }
    }

    /// Run until `step` steps have completed, then pause.
    pub fn go_to_step(&self, step: u64) -> Result<(), ControlError> {
        self.send(Command::GoToStep(Step(step)))
    }

    /// Run until the next event would be later than `time`, then pause.
    pub fn go_to_time(&self, time: Time) -> Result<(), ControlError> {
        self.send(Command::GoToTime(time))
    }

    /// Current status.
    pub fn status(&self) -> EngineStatus {
        self.status.get()
    }

    /// The failure cause, if the engine stopped with an error.
    pub fn error(&self) -> Option<StepError> {
        match self.status.get() {
            EngineStatus::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Block until the engine reaches `kind`.
    pub fn wait_for(
        &self,
        kind: StatusKind,
        timeout: Duration,
    ) -> Result<EngineStatus, ControlError> {
        self.status.wait_for(kind, timeout)
    }

    /// Receive every future status transition.
    pub fn subscribe(&self) -> Receiver<StatusChange> {
        self.status.subscribe()
    }

    /// Insert a reaction at the next boundary.
    ///
    /// The ticket yields the new id, or `None` if the reaction failed its
    /// first scheduling.
    pub fn add_reaction(
        &self,
        reaction: Box<dyn Reaction<E>>,
    ) -> Result<Ticket<Option<ReactionId>>, ControlError> {
        let (tx, ticket) = Ticket::channel();
        self.send(Command::AddReaction(reaction, tx))?;
        Ok(ticket)
    }

    /// Remove a reaction at the next boundary. The ticket yields whether
    /// it was present.
    pub fn remove_reaction(&self, id: ReactionId) -> Result<Ticket<bool>, ControlError> {
        let (tx, ticket) = Ticket::channel();
        self.send(Command::RemoveReaction(id, tx))?;
        Ok(ticket)
    }

    /// Run `f` against the environment at the next boundary.
    pub fn inspect<R, F>(&self, f: F) -> Result<Ticket<R>, ControlError>
    where
        R: Send + 'static,
        F: FnOnce(&E, &EngineView) -> R + Send + 'static,
    {
        let (tx, ticket) = Ticket::channel();
        self.send(Command::Inspect(Box::new(move |env, view| {
            let _ = tx.send(f(env, view));
        })))?;
        Ok(ticket)
    }

    /// Attach a monitor at the next boundary.
    pub fn add_monitor(&self, monitor: Box<dyn OutputMonitor<E>>) -> Result<(), ControlError> {
        self.send(Command::AddMonitor(monitor))
    }
}
