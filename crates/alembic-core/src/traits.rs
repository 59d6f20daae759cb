//! Collaborator traits: the environment a model lives in and the reactions
//! that change it.
//!
//! These are the only extension points of the kernel. The engine never
//! inspects concrete reaction, condition, or environment types.

use smallvec::SmallVec;

use crate::error::ReactionError;
use crate::id::{NodeId, Step};
use crate::influence::InfluenceSet;
use crate::time::Time;

/// The engine's sole source of randomness.
///
/// Seeded from the engine configuration so a run is reproducible.
pub type SimRng = rand_chacha::ChaCha8Rng;

/// Execution context passed to [`Reaction::recompute`] and
/// [`Reaction::apply`].
///
/// Typically built by the engine. Tests construct it directly.
pub struct StepContext<'a> {
    now: Time,
    step: Step,
    rng: &'a mut SimRng,
}

impl<'a> StepContext<'a> {
    /// Construct a new step context.
    pub fn new(now: Time, step: Step, rng: &'a mut SimRng) -> Self {
        Self { now, step, rng }
    }

    /// Current simulated time.
    pub fn now(&self) -> Time {
        self.now
    }

    /// Number of steps executed before this one.
    pub fn step(&self) -> Step {
        self.step
    }

    /// The engine's random generator.
    pub fn rng(&mut self) -> &mut SimRng {
        self.rng
    }
}

/// Why a reaction is being asked for a new putative time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Refresh {
    /// First scheduling, at engine construction or on insertion.
    Initial,
    /// The reaction itself just fired.
    Fired,
    /// Another reaction fired and wrote something this one touches, or
    /// the environment around its node changed.
    Dependency,
}

/// A structural change reported by the environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvironmentChange {
    /// The node's neighbourhood changed, so influence sets that depend on
    /// neighbours may be stale.
    NeighbourhoodChanged(NodeId),
    /// The node was removed. Its reactions must leave the engine.
    NodeRemoved(NodeId),
}

/// The world a model lives in.
///
/// Reactions read and mutate the concrete environment type directly. The
/// engine only needs neighbourhood queries and a change feed.
pub trait Environment: Send + 'static {
    /// Nodes adjacent to `node`, in a deterministic order.
    fn neighbours(&self, node: NodeId) -> SmallVec<[NodeId; 8]>;

    /// Whether `node` currently exists.
    fn contains_node(&self, node: NodeId) -> bool;

    /// Take every structural change recorded since the last call.
    ///
    /// Drained by the engine once per step, after rescheduling.
    fn drain_changes(&mut self) -> Vec<EnvironmentChange> {
        Vec::new()
    }
}

/// A schedulable event.
///
/// A reaction declares which elements it reads and writes, computes its
/// next putative time, and applies its effects when chosen.
///
/// # Contract
///
/// - `recompute` must return a time no earlier than `ctx.now()`. An
///   earlier time stops the engine with a time regression.
/// - `influence_set` must over-approximate what `can_execute`,
///   `recompute` and `apply` read or write. Under-declaring leaves stale
///   schedules behind.
/// - All randomness must come from `ctx.rng()`.
pub trait Reaction<E: Environment>: Send + 'static {
    /// Human-readable name, used in errors and logs.
    fn name(&self) -> &str;

    /// The node this reaction is attached to, if any.
    ///
    /// Reactions attached to a removed node are dropped by the engine.
    fn node(&self) -> Option<NodeId> {
        None
    }

    /// Elements this reaction reads and writes in the current environment.
    fn influence_set(&self, env: &E) -> InfluenceSet;

    /// Whether the reaction's conditions currently hold. A reaction whose
    /// gate is closed still consumes its scheduled slot, but applies no
    /// effects.
    fn can_execute(&self, _env: &E) -> bool {
        true
    }

    /// Compute the next putative firing time.
    ///
    /// Return [`Time::INFINITE`] to park the reaction.
    fn recompute(
        &mut self,
        env: &E,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError>;

    /// Apply the reaction's effects.
    fn apply(&mut self, env: &mut E, ctx: &mut StepContext<'_>) -> Result<(), ReactionError>;
}
