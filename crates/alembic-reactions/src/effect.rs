//! Effects: what a reaction does to the environment when it fires.

use alembic_core::{ElementSet, Environment, NodeId, ReactionError, StepContext};
use rand::Rng;

use crate::environment::{GraphEnvironment, MoleculeId};

/// A state change applied when a reaction fires.
pub trait Effect<E: Environment>: Send + 'static {
    /// Elements the effect reads to decide what to change.
    fn reads(&self, _env: &E, _node: NodeId) -> ElementSet {
        ElementSet::empty()
    }

    /// Elements the effect may write.
    fn writes(&self, env: &E, node: NodeId) -> ElementSet;

    /// Apply the change. Randomness must come from `ctx.rng()`.
    fn apply(
        &mut self,
        env: &mut E,
        node: NodeId,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError>;
}

fn add(
    env: &mut GraphEnvironment,
    node: NodeId,
    molecule: MoleculeId,
    delta: f64,
) -> Result<(), ReactionError> {
    let value = env.concentration(node, molecule) + delta;
    if value < 0.0 {
        return Err(ReactionError::failed(format!(
            "{molecule} at {node} would become {value}"
        )));
    }
    if !env.set_concentration(node, molecule, value) {
        return Err(ReactionError::failed(format!("node {node} does not exist")));
    }
    Ok(())
}

/// Adds `delta` (possibly negative) to the local concentration.
///
/// Fails rather than letting a concentration drop below zero.
#[derive(Clone, Debug)]
pub struct ChangeConcentration {
    /// The molecule to change.
    pub molecule: MoleculeId,
    /// Amount added per firing.
    pub delta: f64,
}

impl Effect<GraphEnvironment> for ChangeConcentration {
    fn writes(&self, _env: &GraphEnvironment, node: NodeId) -> ElementSet {
        std::iter::once(GraphEnvironment::element(node, self.molecule)).collect()
    }

    fn apply(
        &mut self,
        env: &mut GraphEnvironment,
        node: NodeId,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        add(env, node, self.molecule, self.delta)
    }
}

/// Adds `delta` to the concentration of one neighbour picked uniformly at
/// random.
///
/// Only neighbours that can absorb the change qualify: when `delta` is
/// negative, a neighbour needs at least `-delta`. With no qualifying
/// neighbour the effect does nothing.
#[derive(Clone, Debug)]
pub struct ChangeConcentrationInNeighbour {
    /// The molecule to change.
    pub molecule: MoleculeId,
    /// Amount added per firing.
    pub delta: f64,
}

impl Effect<GraphEnvironment> for ChangeConcentrationInNeighbour {
    fn reads(&self, env: &GraphEnvironment, node: NodeId) -> ElementSet {
        self.writes(env, node)
    }

    fn writes(&self, env: &GraphEnvironment, node: NodeId) -> ElementSet {
        env.neighbours(node)
            .into_iter()
            .map(|n| GraphEnvironment::element(n, self.molecule))
            .collect()
    }

    fn apply(
        &mut self,
        env: &mut GraphEnvironment,
        node: NodeId,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        let candidates: Vec<NodeId> = env
            .neighbours(node)
            .into_iter()
            .filter(|&n| self.delta >= 0.0 || env.concentration(n, self.molecule) >= -self.delta)
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        let target = candidates[ctx.rng().random_range(0..candidates.len())];
        add(env, target, self.molecule, self.delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_core::{Element, SimRng, Step, Time};
    use rand::SeedableRng;

    const A: MoleculeId = MoleculeId(0);

    #[test]
    fn local_change_refuses_negative_result() {
        let mut env = GraphEnvironment::ring(1);
        let mut rng = SimRng::seed_from_u64(0);
        let mut ctx = StepContext::new(Time::ZERO, Step(0), &mut rng);
        let n = NodeId(0);
        env.set_concentration(n, A, 1.0);

        let mut consume = ChangeConcentration { molecule: A, delta: -1.0 };
        consume.apply(&mut env, n, &mut ctx).unwrap();
        assert_eq!(env.concentration(n, A), 0.0);
        assert!(consume.apply(&mut env, n, &mut ctx).is_err());
        assert_eq!(env.concentration(n, A), 0.0);
        assert!(consume.writes(&env, n).contains(&Element::node(n, 0)));
        assert!(consume.reads(&env, n).is_empty());
    }

    #[test]
    fn neighbour_change_picks_a_qualifying_neighbour() {
        let mut env = GraphEnvironment::ring(3);
        let mut rng = SimRng::seed_from_u64(3);
        let mut ctx = StepContext::new(Time::ZERO, Step(0), &mut rng);
        env.set_concentration(NodeId(2), A, 1.0);

        let mut take = ChangeConcentrationInNeighbour { molecule: A, delta: -1.0 };
        // Only node 2 has enough.
        take.apply(&mut env, NodeId(0), &mut ctx).unwrap();
        assert_eq!(env.concentration(NodeId(2), A), 0.0);
        // Nobody qualifies now.
        take.apply(&mut env, NodeId(0), &mut ctx).unwrap();
        assert_eq!(env.total(A), 0.0);
    }

    #[test]
    fn neighbour_change_spreads_over_neighbours() {
        let mut env = GraphEnvironment::ring(5);
        let mut rng = SimRng::seed_from_u64(11);
        let mut ctx = StepContext::new(Time::ZERO, Step(0), &mut rng);
        let mut give = ChangeConcentrationInNeighbour { molecule: A, delta: 1.0 };
        for _ in 0..200 {
            give.apply(&mut env, NodeId(0), &mut ctx).unwrap();
        }
        let left = env.concentration(NodeId(4), A);
        let right = env.concentration(NodeId(1), A);
        assert_eq!(left + right, 200.0);
        assert!(left > 50.0 && right > 50.0);
        assert_eq!(env.concentration(NodeId(0), A), 0.0);
        assert_eq!(give.writes(&env, NodeId(0)).len(), Some(2));
    }
}
