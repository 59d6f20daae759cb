//! Conditions gate a reaction and scale its propensity.

use alembic_core::{ElementSet, Environment, NodeId};

use crate::environment::{GraphEnvironment, MoleculeId};

/// A predicate over the environment around a reaction's node.
pub trait Condition<E: Environment>: Send + 'static {
    /// Elements the condition reads.
    fn reads(&self, env: &E, node: NodeId) -> ElementSet;

    /// Whether the condition currently holds.
    fn is_valid(&self, env: &E, node: NodeId) -> bool;

    /// Factor this condition contributes to the reaction's propensity.
    /// Zero whenever the condition does not hold.
    fn propensity_contribution(&self, env: &E, node: NodeId) -> f64;
}

/// Holds while the local concentration is at least `threshold`.
/// Contributes `1` when valid.
#[derive(Clone, Debug)]
pub struct ConcentrationAtLeast {
    /// The molecule to check.
    pub molecule: MoleculeId,
    /// Minimum concentration.
    pub threshold: f64,
}

impl Condition<GraphEnvironment> for ConcentrationAtLeast {
    fn reads(&self, _env: &GraphEnvironment, node: NodeId) -> ElementSet {
        std::iter::once(GraphEnvironment::element(node, self.molecule)).collect()
    }

    fn is_valid(&self, env: &GraphEnvironment, node: NodeId) -> bool {
        env.concentration(node, self.molecule) >= self.threshold
    }

    fn propensity_contribution(&self, env: &GraphEnvironment, node: NodeId) -> f64 {
        if self.is_valid(env, node) {
            1.0
        } else {
            0.0
        }
    }
}

/// Mass-action kinetics for `count` copies of a reactant.
///
/// Contributes the binomial coefficient `C(n, count)` where `n` is the
/// local concentration rounded down: the number of distinct ways to pick
/// the reactants.
#[derive(Clone, Debug)]
pub struct MassAction {
    /// The reactant.
    pub molecule: MoleculeId,
    /// Copies consumed per firing.
    pub count: u32,
}

fn binomial(n: f64, k: u32) -> f64 {
    if n < f64::from(k) {
        return 0.0;
    }
    (0..k).fold(1.0, |acc, i| acc * (n - f64::from(i)) / f64::from(i + 1))
}

impl Condition<GraphEnvironment> for MassAction {
    fn reads(&self, _env: &GraphEnvironment, node: NodeId) -> ElementSet {
        std::iter::once(GraphEnvironment::element(node, self.molecule)).collect()
    }

    fn is_valid(&self, env: &GraphEnvironment, node: NodeId) -> bool {
        env.concentration(node, self.molecule) >= f64::from(self.count)
    }

    fn propensity_contribution(&self, env: &GraphEnvironment, node: NodeId) -> f64 {
        binomial(env.concentration(node, self.molecule).floor(), self.count)
    }
}

/// Holds while at least one neighbour has `threshold` of `molecule`.
/// Contributes the number of such neighbours.
#[derive(Clone, Debug)]
pub struct NeighbourHas {
    /// The molecule to look for.
    pub molecule: MoleculeId,
    /// Minimum concentration in a qualifying neighbour.
    pub threshold: f64,
}

impl NeighbourHas {
    fn qualifying(&self, env: &GraphEnvironment, node: NodeId) -> usize {
        env.neighbours(node)
            .into_iter()
            .filter(|&n| env.concentration(n, self.molecule) >= self.threshold)
            .count()
    }
}

impl Condition<GraphEnvironment> for NeighbourHas {
    fn reads(&self, env: &GraphEnvironment, node: NodeId) -> ElementSet {
        env.neighbours(node)
            .into_iter()
            .map(|n| GraphEnvironment::element(n, self.molecule))
            .collect()
    }

    fn is_valid(&self, env: &GraphEnvironment, node: NodeId) -> bool {
        self.qualifying(env, node) > 0
    }

    fn propensity_contribution(&self, env: &GraphEnvironment, node: NodeId) -> f64 {
        self.qualifying(env, node) as f64
    }
}
