//! Alembic: a discrete-event simulation kernel for agent- and field-based
//! models.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Alembic sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use alembic::prelude::*;
//!
//! // Two nodes; A on node 0 decays into B.
//! let mut env = GraphEnvironment::ring(2);
//! let (a, b) = (MoleculeId(0), MoleculeId(1));
//! env.set_concentration(NodeId(0), a, 10.0);
//!
//! let decay = ChemicalReaction::<GraphEnvironment>::builder("decay")
//!     .on_node(NodeId(0))
//!     .rate(1.0)
//!     .condition(MassAction { molecule: a, count: 1 })
//!     .effect(ChangeConcentration { molecule: a, delta: -1.0 })
//!     .effect(ChangeConcentration { molecule: b, delta: 1.0 })
//!     .build()
//!     .unwrap();
//!
//! let mut engine = Engine::new(env, vec![Box::new(decay)], EngineConfig::seeded(42)).unwrap();
//! assert_eq!(engine.run_to_end(), EngineStatus::Terminated);
//! assert_eq!(engine.step_count(), Step(10));
//! assert_eq!(engine.environment().concentration(NodeId(0), b), 10.0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `alembic-core` | Time, ids, influence sets, errors, collaborator traits |
//! | [`schedule`] | `alembic-schedule` | Schedulers and the dependency graph |
//! | [`engine`] | `alembic-engine` | Engine, control handle, monitors, threads, batches |
//! | [`reactions`] | `alembic-reactions` | Reference graph environment and chemical reactions |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and traits (`alembic-core`).
///
/// The extension points are [`types::Environment`] and [`types::Reaction`].
pub use alembic_core as types;

/// Event scheduling and dependency tracking (`alembic-schedule`).
pub use alembic_schedule as schedule;

/// The discrete-event engine (`alembic-engine`).
///
/// [`engine::Engine`] for direct or lockstep driving,
/// [`engine::EngineThread`] for a background run steered through an
/// [`engine::EngineHandle`], and [`engine::run_batch`] for independent
/// runs in parallel.
pub use alembic_engine as engine;

/// Reference incarnation (`alembic-reactions`).
pub use alembic_reactions as reactions;

/// Common imports for typical Alembic usage.
///
/// ```rust
/// use alembic::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use alembic_core::{
        Element, ElementSet, EngineStatus, Environment, EnvironmentChange, InfluenceSet, NodeId,
        Reaction, ReactionId, Refresh, SimRng, StatusKind, Step, StepContext, Time,
    };

    // Errors
    pub use alembic_core::{ControlError, ReactionError, StepError, TimeError};

    // Engine
    pub use alembic_engine::{
        run_batch, BatchConfig, ConfigError, Engine, EngineConfig, EngineHandle, EngineThread,
        OutputMonitor, Progress, StepEvent, TraceRecorder,
    };

    // Reference incarnation
    pub use alembic_reactions::{
        ChangeConcentration, ChangeConcentrationInNeighbour, ChemicalReaction, ConcentrationAtLeast,
        DiracComb, ExponentialTime, GraphEnvironment, MassAction, MoleculeId, NeighbourHas,
        Trigger,
    };
}
