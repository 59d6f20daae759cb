//! A reaction composed from conditions, effects and a time distribution.

use alembic_core::{
    ElementSet, Environment, InfluenceSet, NodeId, Reaction, ReactionError, Refresh,
    StepContext, Time,
};

use crate::condition::Condition;
use crate::distribution::{ExponentialTime, TimeDistribution};
use crate::effect::Effect;

/// A reaction on one node: fires when all its conditions hold, at times
/// drawn from its distribution with propensity
/// `rate * product(condition contributions)`.
///
/// # Construction
///
/// ```
/// use alembic_core::NodeId;
/// use alembic_reactions::{
///     ChangeConcentration, ChemicalReaction, GraphEnvironment, MassAction, MoleculeId,
/// };
///
/// let a = MoleculeId(0);
/// let decay = ChemicalReaction::<GraphEnvironment>::builder("decay")
///     .on_node(NodeId(0))
///     .rate(0.5)
///     .condition(MassAction { molecule: a, count: 1 })
///     .effect(ChangeConcentration { molecule: a, delta: -1.0 })
///     .build()
///     .unwrap();
/// assert_eq!(decay.rate(), 0.5);
/// ```
pub struct ChemicalReaction<E: Environment> {
    name: String,
    node: NodeId,
    rate: f64,
    conditions: Vec<Box<dyn Condition<E>>>,
    effects: Vec<Box<dyn Effect<E>>>,
    distribution: Box<dyn TimeDistribution>,
}

/// Builder for [`ChemicalReaction`].
///
/// Required: `on_node` and at least one effect. Defaults: rate `1`,
/// no conditions, [`ExponentialTime`].
pub struct ChemicalReactionBuilder<E: Environment> {
    name: String,
    node: Option<NodeId>,
    rate: f64,
    conditions: Vec<Box<dyn Condition<E>>>,
    effects: Vec<Box<dyn Effect<E>>>,
    distribution: Option<Box<dyn TimeDistribution>>,
}

impl<E: Environment> ChemicalReaction<E> {
    /// Start building a reaction called `name`.
    pub fn builder(name: impl Into<String>) -> ChemicalReactionBuilder<E> {
        ChemicalReactionBuilder {
            name: name.into(),
            node: None,
            rate: 1.0,
            conditions: Vec::new(),
            effects: Vec::new(),
            distribution: None,
        }
    }

    /// The kinetic rate constant.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Current propensity: rate times every condition's contribution.
    pub fn propensity(&self, env: &E) -> f64 {
        self.conditions
            .iter()
            .fold(self.rate, |acc, c| acc * c.propensity_contribution(env, self.node))
    }
}

impl<E: Environment> ChemicalReactionBuilder<E> {
    /// The node the reaction lives on.
    pub fn on_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Kinetic rate constant. Must be finite and non-negative.
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Add a condition.
    pub fn condition(mut self, condition: impl Condition<E>) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }

    /// Add an effect. Effects apply in insertion order.
    pub fn effect(mut self, effect: impl Effect<E>) -> Self {
        self.effects.push(Box::new(effect));
        self
    }

    /// Replace the default exponential distribution.
    pub fn distribution(mut self, distribution: impl TimeDistribution) -> Self {
        self.distribution = Some(Box::new(distribution));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<ChemicalReaction<E>, String> {
        let node = self
            .node
            .ok_or_else(|| format!("reaction '{}': node is required", self.name))?;
        if !(self.rate.is_finite() && self.rate >= 0.0) {
            return Err(format!(
                "reaction '{}': rate must be finite and >= 0, got {}",
                self.name, self.rate
            ));
        }
        if self.effects.is_empty() {
            return Err(format!("reaction '{}': at least one effect is required", self.name));
        }
        Ok(ChemicalReaction {
            name: self.name,
            node,
            rate: self.rate,
            conditions: self.conditions,
            effects: self.effects,
            distribution: self
                .distribution
                .unwrap_or_else(|| Box::new(ExponentialTime::new())),
        })
    }
}

impl<E: Environment> Reaction<E> for ChemicalReaction<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn node(&self) -> Option<NodeId> {
        Some(self.node)
    }

    fn influence_set(&self, env: &E) -> InfluenceSet {
        let node = self.node;
        let reads = self
            .conditions
            .iter()
            .map(|c| c.reads(env, node))
            .chain(self.effects.iter().map(|e| e.reads(env, node)))
            .fold(ElementSet::empty(), |acc, set| acc.union(&set));
        let writes = self
            .effects
            .iter()
            .map(|e| e.writes(env, node))
            .fold(ElementSet::empty(), |acc, set| acc.union(&set));
        InfluenceSet::new(reads, writes)
    }

    fn can_execute(&self, env: &E) -> bool {
        self.conditions.iter().all(|c| c.is_valid(env, self.node))
    }

    fn recompute(
        &mut self,
        env: &E,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        if !env.contains_node(self.node) {
            return Ok(Time::INFINITE);
        }
        let rate = self.propensity(env);
        self.distribution.next_time(rate, ctx, refresh)
    }

    fn apply(&mut self, env: &mut E, ctx: &mut StepContext<'_>) -> Result<(), ReactionError> {
        let node = self.node;
        self.effects
            .iter_mut()
            .try_for_each(|effect| effect.apply(env, node, ctx))
    }
}

impl<E: Environment> std::fmt::Debug for ChemicalReaction<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChemicalReaction")
            .field("name", &self.name)
            .field("node", &self.node)
            .field("rate", &self.rate)
            .field("conditions", &self.conditions.len())
            .field("effects", &self.effects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ChangeConcentration, ChangeConcentrationInNeighbour, ConcentrationAtLeast, DiracComb,
        GraphEnvironment, MassAction, MoleculeId, NeighbourHas,
    };
    use alembic_core::{Element, SimRng, Step};
    use rand::SeedableRng;

    const A: MoleculeId = MoleculeId(0);
    const B: MoleculeId = MoleculeId(1);

    fn builder(name: &str) -> ChemicalReactionBuilder<GraphEnvironment> {
        ChemicalReaction::builder(name)
    }

    #[test]
    fn build_validates() {
        let missing_node = builder("r")
            .effect(ChangeConcentration { molecule: A, delta: 1.0 })
            .build();
        assert!(missing_node.unwrap_err().contains("node"));

        let bad_rate = builder("r")
            .on_node(NodeId(0))
            .rate(-1.0)
            .effect(ChangeConcentration { molecule: A, delta: 1.0 })
            .build();
        assert!(bad_rate.unwrap_err().contains("rate"));

        let no_effect = builder("r").on_node(NodeId(0)).build();
        assert!(no_effect.unwrap_err().contains("effect"));
    }

    #[test]
    fn propensity_multiplies_contributions() {
        let mut env = GraphEnvironment::ring(1);
        let n = NodeId(0);
        env.set_concentration(n, A, 4.0);
        env.set_concentration(n, B, 3.0);
        let r = builder("bind")
            .on_node(n)
            .rate(0.5)
            .condition(MassAction { molecule: A, count: 2 })
            .condition(MassAction { molecule: B, count: 1 })
            .effect(ChangeConcentration { molecule: A, delta: -2.0 })
            .build()
            .unwrap();
        // 0.5 * C(4, 2) * C(3, 1)
        assert_eq!(r.propensity(&env), 9.0);
        assert!(r.can_execute(&env));
        env.set_concentration(n, B, 0.0);
        assert_eq!(r.propensity(&env), 0.0);
        assert!(!r.can_execute(&env));
    }

    #[test]
    fn influence_covers_conditions_and_effects() {
        let env = GraphEnvironment::ring(3);
        let r = builder("hop")
            .on_node(NodeId(0))
            .condition(ConcentrationAtLeast { molecule: A, threshold: 1.0 })
            .condition(NeighbourHas { molecule: B, threshold: 1.0 })
            .effect(ChangeConcentration { molecule: A, delta: -1.0 })
            .effect(ChangeConcentrationInNeighbour { molecule: A, delta: 1.0 })
            .build()
            .unwrap();
        let inf = r.influence_set(&env);
        assert!(inf.reads.contains(&Element::node(NodeId(0), 0)));
        assert!(inf.reads.contains(&Element::node(NodeId(1), 1)));
        assert!(inf.reads.contains(&Element::node(NodeId(2), 1)));
        assert!(inf.writes.contains(&Element::node(NodeId(0), 0)));
        assert!(inf.writes.contains(&Element::node(NodeId(1), 0)));
        assert!(inf.writes.contains(&Element::node(NodeId(2), 0)));
        assert!(!inf.writes.contains(&Element::node(NodeId(1), 1)));
        assert_eq!(r.node(), Some(NodeId(0)));
    }

    #[test]
    fn zero_propensity_parks_and_custom_distribution_ignores_it() {
        let env = GraphEnvironment::ring(1);
        let mut rng = SimRng::seed_from_u64(0);
        let mut ctx = StepContext::new(Time::ZERO, Step(0), &mut rng);

        let mut parked = builder("parked")
            .on_node(NodeId(0))
            .condition(MassAction { molecule: A, count: 1 })
            .effect(ChangeConcentration { molecule: A, delta: -1.0 })
            .build()
            .unwrap();
        assert!(parked
            .recompute(&env, &mut ctx, Refresh::Initial)
            .unwrap()
            .is_infinite());

        let mut clock = builder("clock")
            .on_node(NodeId(0))
            .condition(MassAction { molecule: A, count: 1 })
            .effect(ChangeConcentration { molecule: B, delta: 1.0 })
            .distribution(DiracComb::new(Time::new(1.0).unwrap(), 1.0).unwrap())
            .build()
            .unwrap();
        assert_eq!(
            clock.recompute(&env, &mut ctx, Refresh::Initial).unwrap(),
            Time::new(1.0).unwrap()
        );
    }

    #[test]
    fn reactions_on_missing_nodes_never_fire() {
        let env = GraphEnvironment::new();
        let mut rng = SimRng::seed_from_u64(0);
        let mut ctx = StepContext::new(Time::ZERO, Step(0), &mut rng);
        let mut r = builder("ghost")
            .on_node(NodeId(4))
            .effect(ChangeConcentration { molecule: A, delta: 1.0 })
            .build()
            .unwrap();
        assert!(r.recompute(&env, &mut ctx, Refresh::Initial).unwrap().is_infinite());
    }

    #[test]
    fn apply_runs_effects_in_order() {
        let mut env = GraphEnvironment::ring(1);
        let mut rng = SimRng::seed_from_u64(0);
        let mut ctx = StepContext::new(Time::ZERO, Step(0), &mut rng);
        let n = NodeId(0);
        env.set_concentration(n, A, 1.0);
        let mut convert = builder("convert")
            .on_node(n)
            .effect(ChangeConcentration { molecule: A, delta: -1.0 })
            .effect(ChangeConcentration { molecule: B, delta: 1.0 })
            .build()
            .unwrap();
        convert.apply(&mut env, &mut ctx).unwrap();
        assert_eq!(env.concentration(n, A), 0.0);
        assert_eq!(env.concentration(n, B), 1.0);
        // The first effect fails; the second never runs.
        assert!(convert.apply(&mut env, &mut ctx).is_err());
        assert_eq!(env.concentration(n, B), 1.0);
    }
}
