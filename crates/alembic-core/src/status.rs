//! Engine lifecycle status.
//!
//! ```text
//! Ready   --play-->   Running
//! Ready   --stop-->   Terminated
//! Running --pause-->  Paused
//! Paused  --play-->   Running
//! Running --stop / limit / exhausted--> Terminated
//! Running --failure--> Error(cause)
//! Paused  --stop-->   Terminated
//! ```
//!
//! `Terminated` and `Error` are terminal.

use std::fmt;

use crate::error::StepError;

/// Where an engine is in its lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineStatus {
    /// Built and initialised, not yet started.
    Ready,
    /// Executing steps.
    Running,
    /// Suspended at a step boundary.
    Paused,
    /// Finished normally: stopped, limit reached, or nothing left to fire.
    Terminated,
    /// Stopped by a failure. Not resumable.
    Error(StepError),
}

impl EngineStatus {
    /// The payload-free kind of this status.
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Ready => StatusKind::Ready,
            Self::Running => StatusKind::Running,
            Self::Paused => StatusKind::Paused,
            Self::Terminated => StatusKind::Terminated,
            Self::Error(_) => StatusKind::Error,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// The failure cause, if this is [`EngineStatus::Error`].
    pub fn error(&self) -> Option<&StepError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "error: {e}"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Payload-free mirror of [`EngineStatus`], used for waiting and comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// See [`EngineStatus::Ready`].
    Ready,
    /// See [`EngineStatus::Running`].
    Running,
    /// See [`EngineStatus::Paused`].
    Paused,
    /// See [`EngineStatus::Terminated`].
    Terminated,
    /// See [`EngineStatus::Error`].
    Error,
}

impl StatusKind {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Error)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: StatusKind) -> bool {
        use StatusKind::*;
        matches!(
            (self, next),
            (Ready, Running)
                | (Ready, Terminated)
                | (Running, Paused)
                | (Running, Terminated)
                | (Running, Error)
                | (Paused, Running)
                | (Paused, Terminated)
        )
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Terminated => "terminated",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusKind::*;

    const ALL: [StatusKind; 5] = [Ready, Running, Paused, Terminated, Error];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Terminated, Error] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn lifecycle_edges() {
        assert!(Ready.can_transition_to(Running));
        assert!(Ready.can_transition_to(Terminated));
        assert!(!Ready.can_transition_to(Paused));
        assert!(!Ready.can_transition_to(Error));
        assert!(Running.can_transition_to(Paused));
        assert!(Running.can_transition_to(Error));
        assert!(Paused.can_transition_to(Running));
        assert!(Paused.can_transition_to(Terminated));
        assert!(!Paused.can_transition_to(Error));
    }

    #[test]
    fn self_loops_are_rejected() {
        for kind in ALL {
            assert!(!kind.can_transition_to(kind));
        }
    }

    #[test]
    fn error_status_carries_cause() {
        let cause = StepError::InvariantViolated {
            reason: "x".into(),
        };
        let status = EngineStatus::Error(cause.clone());
        assert_eq!(status.kind(), Error);
        assert!(status.is_terminal());
        assert_eq!(status.error(), Some(&cause));
        assert_eq!(EngineStatus::Paused.to_string(), "paused");
    }
}
