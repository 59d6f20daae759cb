//! Running an engine on a dedicated thread.
//!
//! The thread owns the [`Engine`] exclusively (moved in via
//! `thread::Builder::spawn`) and returns it on exit, so callers can
//! inspect the final environment after [`EngineThread::shutdown`] or
//! [`EngineThread::join`].

use std::fmt;
use std::thread::{self, JoinHandle};

use alembic_core::Environment;

use crate::config::ConfigError;
use crate::control::EngineHandle;
use crate::engine::Engine;

/// Failure recovering an engine from its thread.
#[derive(Debug, PartialEq, Eq)]
pub enum EngineThreadError {
    /// The engine thread panicked outside reaction code (e.g. in a
    /// monitor or inspector).
    Panicked,
    /// The engine was already recovered.
    AlreadyJoined,
}

impl fmt::Display for EngineThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked => write!(f, "engine thread panicked"),
            Self::AlreadyJoined => write!(f, "engine thread already joined"),
        }
    }
}

impl std::error::Error for EngineThreadError {}

/// An engine running [`Engine::run`] on a background thread.
///
/// Dropping it stops the engine and joins the thread.
pub struct EngineThread<E: Environment> {
    handle: EngineHandle<E>,
    thread: Option<JoinHandle<Engine<E>>>,
}

impl<E: Environment> Engine<E> {
    /// Move the engine to a thread named `alembic-engine`.
    ///
    /// The engine keeps its status: a ready engine waits for
    /// [`EngineHandle::play`].
    pub fn spawn(self) -> Result<EngineThread<E>, ConfigError> {
        let handle = self.handle();
        let thread = thread::Builder::new()
            .name("alembic-engine".into())
            .spawn(move || {
                let mut engine = self;
                engine.run();
                engine
            })
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;
        Ok(EngineThread {
            handle,
            thread: Some(thread),
        })
    }
}

impl<E: Environment> EngineThread<E> {
    /// Remote control for the running engine.
    pub fn handle(&self) -> &EngineHandle<E> {
        &self.handle
    }

    /// Stop the engine, join the thread, and return the engine.
    pub fn shutdown(mut self) -> Result<Engine<E>, EngineThreadError> {
        self.handle.force_stop();
        self.join_inner()
    }

    /// Wait for the engine to terminate on its own, and return it.
    pub fn join(mut self) -> Result<Engine<E>, EngineThreadError> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<Engine<E>, EngineThreadError> {
        let thread = self.thread.take().ok_or(EngineThreadError::AlreadyJoined)?;
        thread.join().map_err(|_| EngineThreadError::Panicked)
    }
}

impl<E: Environment> Drop for EngineThread<E> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.force_stop();
            let _ = self.join_inner();
        }
    }
}

impl<E: Environment> fmt::Debug for EngineThread<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineThread")
            .field("handle", &self.handle)
            .field("joined", &self.thread.is_none())
            .finish()
    }
}
