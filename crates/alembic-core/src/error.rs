//! Error types for the Alembic simulation kernel.
//!
//! Organised by subsystem: time arithmetic, reactions, the scheduler,
//! engine steps, and the external control surface.

use std::error::Error;
use std::fmt;

use crate::id::ReactionId;
use crate::status::StatusKind;
use crate::time::Time;

/// Invalid simulated time values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeError {
    /// The value was NaN.
    NotANumber,
    /// The value was negative infinity.
    NegativeInfinity,
    /// A time was advanced by a negative amount.
    NegativeDelta {
        /// The offending delta.
        delta: f64,
    },
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber => write!(f, "time is NaN"),
            Self::NegativeInfinity => write!(f, "time is negative infinity"),
            Self::NegativeDelta { delta } => write!(f, "negative time delta {delta}"),
        }
    }
}

impl Error for TimeError {}

/// Errors raised by a reaction's own code.
///
/// Returned from [`Reaction::recompute`](crate::Reaction::recompute) and
/// [`Reaction::apply`](crate::Reaction::apply), then wrapped in
/// [`StepError::ReactionFailed`] by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum ReactionError {
    /// The reaction's logic failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A computed rate was negative or NaN.
    InvalidRate {
        /// The offending rate.
        value: f64,
    },
    /// A computed time was invalid.
    InvalidTime(TimeError),
    /// The reaction panicked. The engine catches the unwind.
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },
}

impl ReactionError {
    /// Shorthand for [`ReactionError::ExecutionFailed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ReactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::InvalidRate { value } => write!(f, "invalid rate {value}"),
            Self::InvalidTime(e) => write!(f, "invalid time: {e}"),
            Self::Panicked { message } => write!(f, "panicked: {message}"),
        }
    }
}

impl Error for ReactionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TimeError> for ReactionError {
    fn from(e: TimeError) -> Self {
        Self::InvalidTime(e)
    }
}

/// Which reaction callback failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReactionPhase {
    /// [`Reaction::apply`](crate::Reaction::apply).
    Apply,
    /// [`Reaction::recompute`](crate::Reaction::recompute).
    Recompute,
    /// [`Reaction::influence_set`](crate::Reaction::influence_set).
    Influence,
    /// [`Reaction::can_execute`](crate::Reaction::can_execute).
    Condition,
}

impl fmt::Display for ReactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Recompute => write!(f, "recompute"),
            Self::Influence => write!(f, "influence"),
            Self::Condition => write!(f, "condition"),
        }
    }
}

/// Errors from scheduler operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    /// Nothing can fire: no reactions, or all at [`Time::INFINITE`].
    Empty,
    /// The reaction is already scheduled.
    AlreadyScheduled {
        /// The duplicate reaction.
        reaction: ReactionId,
    },
    /// The reaction is not scheduled.
    NotScheduled {
        /// The missing reaction.
        reaction: ReactionId,
    },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no reaction can fire"),
            Self::AlreadyScheduled { reaction } => {
                write!(f, "reaction {reaction} is already scheduled")
            }
            Self::NotScheduled { reaction } => write!(f, "reaction {reaction} is not scheduled"),
        }
    }
}

impl Error for ScheduleError {}

/// Errors that stop the engine during a step.
///
/// Carried by [`EngineStatus::Error`](crate::EngineStatus::Error).
#[derive(Clone, Debug, PartialEq)]
pub enum StepError {
    /// The scheduler produced a time earlier than the current one.
    TimeRegression {
        /// Engine time before the step.
        current: Time,
        /// The earlier time the scheduler returned.
        requested: Time,
    },
    /// A reaction callback returned an error or panicked.
    ReactionFailed {
        /// The failing reaction.
        reaction: ReactionId,
        /// Its [`Reaction::name`](crate::Reaction::name).
        name: String,
        /// Which callback failed.
        phase: ReactionPhase,
        /// The underlying error.
        reason: ReactionError,
    },
    /// Internal bookkeeping went out of sync.
    InvariantViolated {
        /// What was found to be inconsistent.
        reason: String,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeRegression { current, requested } => {
                write!(f, "time regression: {requested} is before {current}")
            }
            Self::ReactionFailed {
                reaction,
                name,
                phase,
                reason,
            } => write!(f, "reaction '{name}' ({reaction}) failed in {phase}: {reason}"),
            Self::InvariantViolated { reason } => write!(f, "invariant violated: {reason}"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReactionFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Errors returned to external controllers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlError {
    /// The engine has reached a terminal status and accepts no commands.
    EngineTerminated {
        /// The terminal status.
        status: StatusKind,
    },
    /// The command queue is at capacity.
    QueueFull,
    /// The engine has been dropped.
    Disconnected,
    /// A wait expired before the condition held.
    Timeout,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineTerminated { status } => write!(f, "engine is {status}"),
            Self::QueueFull => write!(f, "command queue full"),
            Self::Disconnected => write!(f, "engine disconnected"),
            Self::Timeout => write!(f, "timed out"),
        }
    }
}

impl Error for ControlError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_failed_display_names_everything() {
        let err = StepError::ReactionFailed {
            reaction: ReactionId(4),
            name: "decay".into(),
            phase: ReactionPhase::Apply,
            reason: ReactionError::failed("boom"),
        };
        assert_eq!(
            err.to_string(),
            "reaction 'decay' (r4) failed in apply: execution failed: boom"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn time_error_converts() {
        let e: ReactionError = TimeError::NotANumber.into();
        assert_eq!(e, ReactionError::InvalidTime(TimeError::NotANumber));
        assert!(e.source().is_some());
    }

    #[test]
    fn control_error_display() {
        let e = ControlError::EngineTerminated {
            status: StatusKind::Terminated,
        };
        assert_eq!(e.to_string(), "engine is terminated");
    }
}
