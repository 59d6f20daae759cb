//! Reusable reaction fixtures for engine testing.
//!
//! All fixtures run against [`CounterEnvironment`]:
//!
//! - [`FixedIntervalReaction`] fires every `period`, optionally gated,
//!   incrementing the counters it writes.
//! - [`FailingReaction`] fails deterministically after N calls.
//! - [`SpyReaction`] detects stale schedules.
//! - [`NeverReaction`] parks at [`Time::INFINITE`].
//! - [`RandomDelayReaction`] draws its delays from the engine rng.
//! - [`PanickingReaction`] panics when applied.
//! - [`TimeTravelReaction`] reschedules itself into the past.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alembic_core::{
    Element, ElementSet, Environment, InfluenceSet, NodeId, Reaction, ReactionError, Refresh,
    StepContext, Time,
};
use rand::Rng;

use crate::CounterEnvironment;

fn counters(keys: &[u32]) -> ElementSet {
    keys.iter().copied().map(Element::global).collect()
}

// ── FixedIntervalReaction ────────────────────────────────────────

/// Fires every `period` time units and increments each counter it writes.
///
/// A dependency refresh keeps the already scheduled time, so the firing
/// sequence is `start + period, start + 2 * period, ...` regardless of
/// what else runs.
pub struct FixedIntervalReaction {
    name: String,
    period: f64,
    node: Option<NodeId>,
    reads: Vec<u32>,
    writes: Vec<u32>,
    neighbour_reads: Vec<u32>,
    gate: Option<(u32, i64)>,
    next: Time,
    fired: Arc<AtomicUsize>,
}

impl FixedIntervalReaction {
    pub fn new(name: impl Into<String>, period: f64) -> Self {
        Self {
            name: name.into(),
            period,
            node: None,
            reads: Vec::new(),
            writes: Vec::new(),
            neighbour_reads: Vec::new(),
            gate: None,
            next: Time::INFINITE,
            fired: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn on_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn reading(mut self, key: u32) -> Self {
        self.reads.push(key);
        self
    }

    pub fn writing(mut self, key: u32) -> Self {
        self.writes.push(key);
        self
    }

    /// Read `key` on every neighbour of the attached node.
    pub fn reading_neighbours(mut self, key: u32) -> Self {
        self.neighbour_reads.push(key);
        self
    }

    /// Apply effects only while counter `key` is at least `min`.
    pub fn when_at_least(mut self, key: u32, min: i64) -> Self {
        self.gate = Some((key, min));
        self
    }

    /// Shared count of applied firings.
    pub fn fired(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fired)
    }
}

impl Reaction<CounterEnvironment> for FixedIntervalReaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn node(&self) -> Option<NodeId> {
        self.node
    }

    fn influence_set(&self, env: &CounterEnvironment) -> InfluenceSet {
        let mut reads = counters(&self.reads);
        if let Some((key, _)) = self.gate {
            reads.insert(Element::global(key));
        }
        if let Some(node) = self.node {
            for neighbour in env.neighbours(node) {
                for &key in &self.neighbour_reads {
                    reads.insert(Element::node(neighbour, key));
                }
            }
        }
        InfluenceSet::new(reads, counters(&self.writes))
    }

    fn can_execute(&self, env: &CounterEnvironment) -> bool {
        self.gate.is_none_or(|(key, min)| env.counter(key) >= min)
    }

    fn recompute(
        &mut self,
        _env: &CounterEnvironment,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        if refresh != Refresh::Dependency {
            self.next = ctx.now().plus(self.period)?;
        }
        Ok(self.next)
    }

    fn apply(
        &mut self,
        env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        for &key in &self.writes {
            env.increment(key, 1);
        }
        self.fired.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ── FailingReaction ──────────────────────────────────────────────

/// Succeeds `succeed_count` times, then fails every call.
///
/// By default `apply` fails; [`in_recompute`](Self::in_recompute) moves
/// the failure to `recompute` (the initial scheduling counts as a call).
pub struct FailingReaction {
    name: String,
    period: f64,
    succeed_count: usize,
    calls: usize,
    in_recompute: bool,
}

impl FailingReaction {
    pub fn new(name: impl Into<String>, period: f64, succeed_count: usize) -> Self {
        Self {
            name: name.into(),
            period,
            succeed_count,
            calls: 0,
            in_recompute: false,
        }
    }

    pub fn in_recompute(mut self) -> Self {
        self.in_recompute = true;
        self
    }

    fn call(&mut self) -> Result<(), ReactionError> {
        let n = self.calls;
        self.calls += 1;
        if n >= self.succeed_count {
            return Err(ReactionError::failed(format!(
                "deliberate failure after {} calls",
                self.succeed_count
            )));
        }
        Ok(())
    }
}

impl Reaction<CounterEnvironment> for FailingReaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn influence_set(&self, _env: &CounterEnvironment) -> InfluenceSet {
        InfluenceSet::none()
    }

    fn recompute(
        &mut self,
        _env: &CounterEnvironment,
        ctx: &mut StepContext<'_>,
        _refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        if self.in_recompute {
            self.call()?;
        }
        Ok(ctx.now().plus(self.period)?)
    }

    fn apply(
        &mut self,
        _env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        if self.in_recompute {
            return Ok(());
        }
        self.call()
    }
}

// ── SpyReaction ──────────────────────────────────────────────────

/// Reads counter `key` and fails if it changed since the last recompute.
///
/// If every writer of `key` triggers a dependency refresh, the value seen
/// at recompute always matches the value at firing time.
pub struct SpyReaction {
    name: String,
    key: u32,
    period: f64,
    seen: i64,
    next: Time,
    fired: Arc<AtomicUsize>,
}

impl SpyReaction {
    pub fn new(name: impl Into<String>, key: u32, period: f64) -> Self {
        Self {
            name: name.into(),
            key,
            period,
            seen: 0,
            next: Time::INFINITE,
            fired: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fired(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fired)
    }
}

impl Reaction<CounterEnvironment> for SpyReaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn influence_set(&self, _env: &CounterEnvironment) -> InfluenceSet {
        InfluenceSet::new(counters(&[self.key]), ElementSet::empty())
    }

    fn recompute(
        &mut self,
        env: &CounterEnvironment,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        self.seen = env.counter(self.key);
        if refresh != Refresh::Dependency {
            self.next = ctx.now().plus(self.period)?;
        }
        Ok(self.next)
    }

    fn apply(
        &mut self,
        env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        let current = env.counter(self.key);
        if current != self.seen {
            return Err(ReactionError::failed(format!(
                "stale schedule: counter {} was {} at recompute, {} at firing",
                self.key, self.seen, current
            )));
        }
        self.fired.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ── NeverReaction ────────────────────────────────────────────────

/// Always scheduled at [`Time::INFINITE`]; applying it is an error.
pub struct NeverReaction {
    name: String,
}

impl NeverReaction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Reaction<CounterEnvironment> for NeverReaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn influence_set(&self, _env: &CounterEnvironment) -> InfluenceSet {
        InfluenceSet::none()
    }

    fn recompute(
        &mut self,
        _env: &CounterEnvironment,
        _ctx: &mut StepContext<'_>,
        _refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        Ok(Time::INFINITE)
    }

    fn apply(
        &mut self,
        _env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        Err(ReactionError::failed("a parked reaction fired"))
    }
}

// ── RandomDelayReaction ──────────────────────────────────────────

/// Fires after a uniform delay in `[0, scale)` drawn from the engine rng,
/// incrementing counter `key`.
pub struct RandomDelayReaction {
    name: String,
    scale: f64,
    key: u32,
}

impl RandomDelayReaction {
    pub fn new(name: impl Into<String>, scale: f64, key: u32) -> Self {
        Self {
            name: name.into(),
            scale,
            key,
        }
    }
}

impl Reaction<CounterEnvironment> for RandomDelayReaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn influence_set(&self, _env: &CounterEnvironment) -> InfluenceSet {
        InfluenceSet::new(ElementSet::empty(), counters(&[self.key]))
    }

    fn recompute(
        &mut self,
        _env: &CounterEnvironment,
        ctx: &mut StepContext<'_>,
        _refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        let delay = ctx.rng().random::<f64>() * self.scale;
        Ok(ctx.now().plus(delay)?)
    }

    fn apply(
        &mut self,
        env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        env.increment(self.key, 1);
        Ok(())
    }
}

// ── PanickingReaction ────────────────────────────────────────────

/// Scheduled once at `at`; panics with `message` when applied.
pub struct PanickingReaction {
    name: String,
    at: Time,
    message: String,
    in_condition: bool,
}

impl PanickingReaction {
    pub fn new(name: impl Into<String>, at: Time, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            at,
            message: message.into(),
            in_condition: false,
        }
    }

    /// Panic while checking the gate instead.
    pub fn in_condition(mut self) -> Self {
        self.in_condition = true;
        self
    }
}

impl Reaction<CounterEnvironment> for PanickingReaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn influence_set(&self, _env: &CounterEnvironment) -> InfluenceSet {
        InfluenceSet::none()
    }

    fn can_execute(&self, _env: &CounterEnvironment) -> bool {
        if self.in_condition {
            panic!("{}", self.message);
        }
        true
    }

    fn recompute(
        &mut self,
        _env: &CounterEnvironment,
        _ctx: &mut StepContext<'_>,
        _refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        Ok(self.at)
    }

    fn apply(
        &mut self,
        _env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        panic!("{}", self.message);
    }
}

// ── TimeTravelReaction ───────────────────────────────────────────

/// First fires at `start + period`, then asks to fire `period` before
/// the current time.
pub struct TimeTravelReaction {
    name: String,
    period: f64,
}

impl TimeTravelReaction {
    pub fn new(name: impl Into<String>, period: f64) -> Self {
        Self {
            name: name.into(),
            period,
        }
    }
}

impl Reaction<CounterEnvironment> for TimeTravelReaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn influence_set(&self, _env: &CounterEnvironment) -> InfluenceSet {
        InfluenceSet::none()
    }

    fn recompute(
        &mut self,
        _env: &CounterEnvironment,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        match refresh {
            Refresh::Fired => Ok(Time::new(ctx.now().as_f64() - self.period)?),
            _ => Ok(ctx.now().plus(self.period)?),
        }
    }

    fn apply(
        &mut self,
        _env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_core::{SimRng, Step};
    use rand::SeedableRng;

    fn ctx_at(rng: &mut SimRng, t: f64) -> StepContext<'_> {
        StepContext::new(Time::new(t).unwrap(), Step(0), rng)
    }

    #[test]
    fn fixed_interval_keeps_time_on_dependency_refresh() {
        let env = CounterEnvironment::new();
        let mut rng = SimRng::seed_from_u64(0);
        let mut r = FixedIntervalReaction::new("tick", 2.0);
        let first = r.recompute(&env, &mut ctx_at(&mut rng, 0.0), Refresh::Initial).unwrap();
        assert_eq!(first, Time::new(2.0).unwrap());
        let again = r
            .recompute(&env, &mut ctx_at(&mut rng, 1.0), Refresh::Dependency)
            .unwrap();
        assert_eq!(again, first);
        let next = r.recompute(&env, &mut ctx_at(&mut rng, 2.0), Refresh::Fired).unwrap();
        assert_eq!(next, Time::new(4.0).unwrap());
    }

    #[test]
    fn fixed_interval_gate_and_writes() {
        let mut env = CounterEnvironment::new();
        let mut rng = SimRng::seed_from_u64(0);
        let mut r = FixedIntervalReaction::new("w", 1.0).writing(1).when_at_least(0, 1);
        assert!(!r.can_execute(&env));
        env.set_counter(0, 1);
        assert!(r.can_execute(&env));
        r.apply(&mut env, &mut ctx_at(&mut rng, 0.0)).unwrap();
        assert_eq!(env.counter(1), 1);
        assert_eq!(r.fired().load(Ordering::Relaxed), 1);

        let inf = r.influence_set(&env);
        assert!(inf.reads.contains(&Element::global(0)));
        assert!(inf.writes.contains(&Element::global(1)));
    }

    #[test]
    fn neighbour_reads_follow_the_graph() {
        let mut env = CounterEnvironment::with_nodes(3);
        let r = FixedIntervalReaction::new("n", 1.0)
            .on_node(NodeId(0))
            .reading_neighbours(5);
        assert!(r.influence_set(&env).reads.is_empty());
        env.connect(NodeId(0), NodeId(2));
        assert!(r
            .influence_set(&env)
            .reads
            .contains(&Element::node(NodeId(2), 5)));
    }

    #[test]
    fn failing_reaction_fails_after_n() {
        let mut env = CounterEnvironment::new();
        let mut rng = SimRng::seed_from_u64(0);
        let mut r = FailingReaction::new("f", 1.0, 2);
        assert!(r.apply(&mut env, &mut ctx_at(&mut rng, 0.0)).is_ok());
        assert!(r.apply(&mut env, &mut ctx_at(&mut rng, 0.0)).is_ok());
        assert!(r.apply(&mut env, &mut ctx_at(&mut rng, 0.0)).is_err());
    }

    #[test]
    fn spy_detects_unrefreshed_writes() {
        let mut env = CounterEnvironment::new();
        let mut rng = SimRng::seed_from_u64(0);
        let mut spy = SpyReaction::new("spy", 0, 1.0);
        spy.recompute(&env, &mut ctx_at(&mut rng, 0.0), Refresh::Initial).unwrap();
        env.increment(0, 1);
        assert!(spy.apply(&mut env, &mut ctx_at(&mut rng, 1.0)).is_err());
        spy.recompute(&env, &mut ctx_at(&mut rng, 1.0), Refresh::Dependency).unwrap();
        assert!(spy.apply(&mut env, &mut ctx_at(&mut rng, 1.0)).is_ok());
        assert_eq!(spy.fired().load(Ordering::Relaxed), 1);
    }

    #[test]
    fn random_delay_is_seed_determined() {
        let env = CounterEnvironment::new();
        let mut a = SimRng::seed_from_u64(42);
        let mut b = SimRng::seed_from_u64(42);
        let mut r = RandomDelayReaction::new("rand", 3.0, 0);
        let x = r.recompute(&env, &mut ctx_at(&mut a, 1.0), Refresh::Initial).unwrap();
        let y = r.recompute(&env, &mut ctx_at(&mut b, 1.0), Refresh::Initial).unwrap();
        assert_eq!(x, y);
        assert!(x >= Time::new(1.0).unwrap() && x < Time::new(4.0).unwrap());
    }
}
