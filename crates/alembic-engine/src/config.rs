//! Engine configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use alembic_core::{StepError, Time};

// ── EngineConfig ───────────────────────────────────────────────────

/// Configuration for constructing an [`Engine`](crate::Engine).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Seed for the engine's random generator. Same seed and same initial
    /// state give the same event sequence.
    pub seed: u64,
    /// Simulated time at construction. Default: 0.
    pub start_time: Time,
    /// Events later than this are never executed; the engine terminates
    /// instead. Default: [`Time::INFINITE`].
    pub end_time: Time,
    /// Terminate after this many steps. Default: unbounded.
    pub max_steps: Option<u64>,
    /// Capacity of the bounded command queue. Default: 256. Minimum: 1.
    pub command_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            start_time: Time::ZERO,
            end_time: Time::INFINITE,
            max_steps: None,
            command_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Default configuration with the given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_queue_capacity == 0 {
            return Err(ConfigError::CommandQueueZero);
        }
        if self.start_time.is_infinite() {
            return Err(ConfigError::InvalidStartTime {
                value: self.start_time,
            });
        }
        if self.end_time < self.start_time {
            return Err(ConfigError::InvalidTimeWindow {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }
}

// ── BatchConfig ────────────────────────────────────────────────────

/// Configuration for [`run_batch`](crate::run_batch).
#[derive(Clone, Debug, Default)]
pub struct BatchConfig {
    /// Maximum engines running at once. `None` = available parallelism.
    pub max_threads: Option<usize>,
}

impl BatchConfig {
    /// Resolve the actual thread count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 256]`.
    pub fn resolved_thread_count(&self) -> usize {
        match self.max_threads {
            Some(n) => n.clamp(1, 256),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while building or launching an engine.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `command_queue_capacity` is zero.
    CommandQueueZero,
    /// `start_time` is infinite.
    InvalidStartTime {
        /// The configured value.
        value: Time,
    },
    /// `end_time` is before `start_time`.
    InvalidTimeWindow {
        /// Configured start.
        start: Time,
        /// Configured end.
        end: Time,
    },
    /// More reactions than `ReactionId` can address.
    TooManyReactions {
        /// Number of reactions supplied.
        count: usize,
    },
    /// A reaction failed while being scheduled for the first time.
    Initialization(StepError),
    /// A background thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandQueueZero => write!(f, "command_queue_capacity must be at least 1"),
            Self::InvalidStartTime { value } => {
                write!(f, "start_time must be finite, got {value}")
            }
            Self::InvalidTimeWindow { start, end } => {
                write!(f, "end_time {end} is before start_time {start}")
            }
            Self::TooManyReactions { count } => {
                write!(f, "{count} reactions exceed the addressable id space")
            }
            Self::Initialization(e) => write!(f, "initialization failed: {e}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Initialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StepError> for ConfigError {
    fn from(e: StepError) -> Self {
        Self::Initialization(e)
    }
}
