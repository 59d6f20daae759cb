//! Reference biochemistry-style incarnation for Alembic.
//!
//! A [`GraphEnvironment`] holds molecule concentrations on the nodes of
//! an undirected graph. A [`ChemicalReaction`] lives on one node and is
//! assembled from parts:
//!
//! - [`Condition`]s gate the reaction and scale its propensity
//!   ([`ConcentrationAtLeast`], [`MassAction`], [`NeighbourHas`]);
//! - [`Effect`]s change concentrations when it fires
//!   ([`ChangeConcentration`], [`ChangeConcentrationInNeighbour`]);
//! - a [`TimeDistribution`] turns the propensity into a firing time
//!   ([`ExponentialTime`], [`DiracComb`], [`Trigger`]).
//!
//! Every part declares what it reads and writes, so the engine's
//! dependency graph stays exact as the model grows.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod condition;
pub mod distribution;
pub mod effect;
pub mod environment;
pub mod reaction;

pub use condition::{ConcentrationAtLeast, Condition, MassAction, NeighbourHas};
pub use distribution::{DiracComb, ExponentialTime, TimeDistribution, Trigger};
pub use effect::{ChangeConcentration, ChangeConcentrationInNeighbour, Effect};
pub use environment::{GraphEnvironment, MoleculeId};
pub use reaction::{ChemicalReaction, ChemicalReactionBuilder};
