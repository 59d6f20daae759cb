//! Output monitors: observers invoked by the engine at step boundaries.

use alembic_core::{Environment, ReactionId, Step, Time};

use crate::command::EngineView;

/// One completed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepEvent {
    /// Steps completed, including this one.
    pub step: Step,
    /// Simulated time of the event.
    pub time: Time,
    /// The reaction that fired.
    pub reaction: ReactionId,
    /// Whether its conditions held and its effects were applied.
    pub executed: bool,
}

/// Observer of an engine run.
///
/// Called on the engine's own thread between steps, so implementations may
/// read the environment freely but must not block for long.
pub trait OutputMonitor<E: Environment>: Send {
    /// The monitor was attached.
    fn initialized(&mut self, _env: &E, _view: &EngineView) {}

    /// A step completed.
    fn step_done(&mut self, _env: &E, _event: &StepEvent) {}

    /// The engine reached a terminal status.
    fn finished(&mut self, _env: &E, _view: &EngineView) {}
}
