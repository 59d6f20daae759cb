//! Running many independent engines in parallel.
//!
//! Each engine runs to completion on its own scoped thread; engines share
//! no mutable state, so the outcome of each is identical to running it
//! alone. At most [`BatchConfig::resolved_thread_count`] engines run at
//! once; the rest wait for the next wave.

use std::fmt;
use std::thread;

use alembic_core::{EngineStatus, Environment, Step, Time};

use crate::config::BatchConfig;
use crate::engine::Engine;

/// Error from a batch run, annotated with the failing engine index.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchError {
    /// An engine's thread panicked outside reaction code.
    EnginePanicked {
        /// Index of the engine in the input (0-based).
        index: usize,
    },
    /// A worker thread could not be spawned.
    ThreadSpawnFailed {
        /// Index of the engine that was not started.
        index: usize,
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnginePanicked { index } => write!(f, "engine {index}: thread panicked"),
            Self::ThreadSpawnFailed { index, reason } => {
                write!(f, "engine {index}: thread spawn failed: {reason}")
            }
        }
    }
}

impl std::error::Error for BatchError {}

/// Final state of one engine in a batch.
pub struct BatchOutcome<E: Environment> {
    /// Index of the engine in the input (0-based).
    pub index: usize,
    /// Terminal status.
    pub status: EngineStatus,
    /// Steps completed.
    pub steps: Step,
    /// Simulated time reached.
    pub time: Time,
    /// The engine itself, for inspecting the final environment.
    pub engine: Engine<E>,
}

impl<E: Environment> fmt::Debug for BatchOutcome<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOutcome")
            .field("index", &self.index)
            .field("status", &self.status)
            .field("steps", &self.steps)
            .field("time", &self.time)
            .finish()
    }
}

/// Play every engine and run each to a terminal status.
///
/// Outcomes are returned in input order.
pub fn run_batch<E: Environment>(
    engines: Vec<Engine<E>>,
    config: &BatchConfig,
) -> Result<Vec<BatchOutcome<E>>, BatchError> {
    let wave = config.resolved_thread_count();
    let total = engines.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut pending = engines.into_iter().enumerate().peekable();
    tracing::debug!(engines = total, threads = wave, "batch started");

    while pending.peek().is_some() {
        let batch: Vec<_> = pending.by_ref().take(wave).collect();
        let result = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(batch.len());
            let mut failure = None;
            for (index, engine) in batch {
                let spawned = thread::Builder::new()
                    .name(format!("alembic-batch-{index}"))
                    .spawn_scoped(scope, move || run_one(index, engine));
                match spawned {
                    Ok(handle) => handles.push((index, handle)),
                    Err(e) => {
                        failure = Some(BatchError::ThreadSpawnFailed {
                            index,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
            // Join every started thread so a panic never escapes the scope.
            let mut finished = Vec::with_capacity(handles.len());
            for (index, handle) in handles {
                match handle.join() {
                    Ok(outcome) => finished.push(outcome),
                    Err(_) => {
                        failure.get_or_insert(BatchError::EnginePanicked { index });
                    }
                }
            }
            match failure {
                Some(e) => Err(e),
                None => Ok(finished),
            }
        });
        outcomes.extend(result?);
    }
    Ok(outcomes)
}

fn run_one<E: Environment>(index: usize, mut engine: Engine<E>) -> BatchOutcome<E> {
    let status = engine.run_to_end();
    BatchOutcome {
        index,
        status,
        steps: engine.step_count(),
        time: engine.now(),
        engine,
    }
}
