//! Benchmark profiles and reference models for Alembic.
//!
//! - [`reference_profile`]: diffusion and decay over a ring of nodes, fed
//!   by a periodic source on node 0
//! - [`reference_reactions`]: the reaction set of that profile for an
//!   arbitrary [`GraphEnvironment`]
//! - [`scheduler_workload`]: deterministic putative times for scheduler
//!   benchmarks

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use alembic_core::{NodeId, Reaction, SimRng, Time};
use alembic_engine::{Engine, EngineConfig};
use alembic_reactions::{
    ChangeConcentration, ChangeConcentrationInNeighbour, ChemicalReaction, DiracComb,
    GraphEnvironment, MassAction, MoleculeId,
};
use rand::{Rng, SeedableRng};

/// Diffusing species.
pub const SUBSTRATE: MoleculeId = MoleculeId(0);
/// Decay product.
pub const PRODUCT: MoleculeId = MoleculeId(1);

/// Initial substrate placed on node 0, per node in the ring.
pub const MASS_PER_NODE: f64 = 10.0;

/// Build the reference engine: `nodes` nodes in a ring, all substrate
/// starting on node 0.
///
/// Per node: diffusion (rate 1) and decay into product (rate 0.01).
/// Node 0 also gets 5 units of substrate every time unit.
pub fn reference_profile(
    seed: u64,
    nodes: u32,
    config: EngineConfig,
) -> Result<Engine<GraphEnvironment>, String> {
    let mut env = GraphEnvironment::ring(nodes);
    env.set_concentration(NodeId(0), SUBSTRATE, MASS_PER_NODE * f64::from(nodes));
    let reactions = reference_reactions(&env)?;
    Engine::new(env, reactions, EngineConfig { seed, ..config }).map_err(|e| e.to_string())
}

/// The reference reaction set for every node of `env`.
pub fn reference_reactions(
    env: &GraphEnvironment,
) -> Result<Vec<Box<dyn Reaction<GraphEnvironment>>>, String> {
    let mut reactions: Vec<Box<dyn Reaction<GraphEnvironment>>> = Vec::new();
    for node in env.nodes() {
        let diffuse = ChemicalReaction::<GraphEnvironment>::builder(format!("diffuse-{node}"))
            .on_node(node)
            .rate(1.0)
            .condition(MassAction { molecule: SUBSTRATE, count: 1 })
            .effect(ChangeConcentration { molecule: SUBSTRATE, delta: -1.0 })
            .effect(ChangeConcentrationInNeighbour { molecule: SUBSTRATE, delta: 1.0 })
            .build()?;
        let decay = ChemicalReaction::<GraphEnvironment>::builder(format!("decay-{node}"))
            .on_node(node)
            .rate(0.01)
            .condition(MassAction { molecule: SUBSTRATE, count: 1 })
            .effect(ChangeConcentration { molecule: SUBSTRATE, delta: -1.0 })
            .effect(ChangeConcentration { molecule: PRODUCT, delta: 1.0 })
            .build()?;
        reactions.push(Box::new(diffuse));
        reactions.push(Box::new(decay));
    }
    if let Some(source) = env.nodes().next() {
        let comb = DiracComb::new(Time::ZERO, 1.0).map_err(|e| e.to_string())?;
        let feed = ChemicalReaction::<GraphEnvironment>::builder("feed")
            .on_node(source)
            .effect(ChangeConcentration { molecule: SUBSTRATE, delta: 5.0 })
            .distribution(comb)
            .build()?;
        reactions.push(Box::new(feed));
    }
    Ok(reactions)
}

/// `count` putative times drawn uniformly from `[0, 1000)`.
///
/// Deterministic for a given seed.
pub fn scheduler_workload(count: usize, seed: u64) -> Vec<Time> {
    let mut rng = SimRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Time::new(rng.random_range(0.0..1000.0)).unwrap_or(Time::ZERO))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_core::EngineStatus;

    #[test]
    fn profile_has_two_reactions_per_node_plus_feed() {
        let engine = reference_profile(1, 8, EngineConfig::default()).unwrap();
        assert_eq!(engine.reaction_count(), 17);
        assert_eq!(engine.environment().total(SUBSTRATE), 80.0);
    }

    #[test]
    fn profile_runs_to_its_limit() {
        let config = EngineConfig {
            max_steps: Some(1_000),
            ..EngineConfig::default()
        };
        let mut engine = reference_profile(5, 16, config).unwrap();
        assert_eq!(engine.run_to_end(), EngineStatus::Terminated);
        assert_eq!(engine.step_count().0, 1_000);
        let env = engine.environment();
        assert!(env.total(PRODUCT) >= 0.0);
        assert!(env.nodes().all(|n| env.concentration(n, SUBSTRATE) >= 0.0));
    }

    #[test]
    fn workload_is_deterministic() {
        let a = scheduler_workload(100, 3);
        assert_eq!(a, scheduler_workload(100, 3));
        assert_ne!(a, scheduler_workload(100, 4));
        assert!(a.iter().all(|t| t.is_finite() && t.as_f64() < 1000.0));
    }
}
