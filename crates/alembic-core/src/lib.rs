//! Core types and traits for the Alembic simulation kernel.
//!
//! This is the leaf crate of the workspace. It defines simulated [`Time`],
//! stable identifiers, influence sets used for dependency tracking, the
//! error taxonomy, the engine status machine, and the two collaborator
//! traits every incarnation implements: [`Environment`] and [`Reaction`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod influence;
pub mod status;
pub mod time;
pub mod traits;

pub use error::{
    ControlError, ReactionError, ReactionPhase, ScheduleError, StepError, TimeError,
};
pub use id::{NodeId, ReactionId, Step};
pub use influence::{Element, ElementSet, InfluenceSet};
pub use status::{EngineStatus, StatusKind};
pub use time::Time;
pub use traits::{Environment, EnvironmentChange, Reaction, Refresh, SimRng, StepContext};
