//! Integration test: only affected reactions are recomputed, and every
//! affected reaction is.
//!
//! A spy reaction remembers the counter it reads at every recompute and
//! fails if the value changed before it fires. Any writer that does not
//! trigger a dependency refresh of the spy surfaces as an engine error.

use std::sync::atomic::Ordering;

use alembic_core::{
    Element, EngineStatus, InfluenceSet, Reaction, ReactionError, ReactionId, Refresh,
    StepContext, Time,
};
use alembic_engine::{Engine, EngineConfig, TraceRecorder};
use alembic_test_utils::{CounterEnvironment, FixedIntervalReaction, SpyReaction};

fn t(value: f64) -> Time {
    Time::new(value).unwrap()
}

/// Increments counter 0 every `period` but declares no writes.
struct UndeclaredWriter {
    period: f64,
}

impl Reaction<CounterEnvironment> for UndeclaredWriter {
    fn name(&self) -> &str {
        "sneaky"
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
        Ok(ctx.now().plus(self.period)?)
    }

    fn apply(
        &mut self,
        env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        env.increment(0, 1);
        Ok(())
    }
}

#[test]
fn spy_always_sees_fresh_state() {
    let spy = SpyReaction::new("spy", 0, 1.0);
    let spy_fired = spy.fired();
    let mut engine = Engine::new(
        CounterEnvironment::new(),
        vec![
            Box::new(FixedIntervalReaction::new("writer", 0.7).writing(0)),
            Box::new(FixedIntervalReaction::new("other", 0.3).writing(1)),
            Box::new(spy),
        ],
        EngineConfig {
            max_steps: Some(500),
            ..EngineConfig::default()
        },
    )
    .unwrap();

    assert_eq!(engine.run_to_end(), EngineStatus::Terminated);
    assert!(spy_fired.load(Ordering::Relaxed) > 50);
}

#[test]
fn undeclared_writes_leave_stale_schedules() {
    let mut engine = Engine::new(
        CounterEnvironment::new(),
        vec![
            Box::new(UndeclaredWriter { period: 0.7 }),
            Box::new(SpyReaction::new("spy", 0, 1.0)),
        ],
        EngineConfig {
            max_steps: Some(100),
            ..EngineConfig::default()
        },
    )
    .unwrap();
    engine.run_to_end();
    assert!(engine.error().is_some());
}

#[test]
fn graph_reflects_declared_influence() {
    let engine = Engine::new(
        CounterEnvironment::new(),
        vec![
            Box::new(FixedIntervalReaction::new("a", 1.0).writing(0)),
            Box::new(FixedIntervalReaction::new("b", 1.0).reading(0).writing(1)),
            Box::new(FixedIntervalReaction::new("c", 1.0).reading(1)),
            Box::new(FixedIntervalReaction::new("d", 1.0).reading(7)),
        ],
        EngineConfig::default(),
    )
    .unwrap();
    let graph = engine.dependency_graph();

    let of = |id: u32| -> Vec<ReactionId> {
        graph.affected_by(ReactionId(id)).unwrap().iter().copied().collect()
    };
    // A writer affects itself through its own writes.
    assert_eq!(of(0), vec![ReactionId(0), ReactionId(1)]);
    assert_eq!(of(1), vec![ReactionId(1), ReactionId(2)]);
    assert!(of(2).is_empty());
    assert!(of(3).is_empty());
    assert!(graph
        .influence(ReactionId(1))
        .unwrap()
        .reads
        .contains(&Element::global(0)));
}

#[test]
fn only_affected_reactions_are_recomputed() {
    let mut engine = Engine::new(
        CounterEnvironment::new(),
        vec![
            Box::new(FixedIntervalReaction::new("writer", 1.0).writing(0)),
            Box::new(FixedIntervalReaction::new("reader", 10.0).reading(0)),
            Box::new(FixedIntervalReaction::new("bystander", 10.0).reading(5)),
        ],
        EngineConfig {
            max_steps: Some(1),
            ..EngineConfig::default()
        },
    )
    .unwrap();
    engine.run_to_end();
    // The writer (fired) and the reader (dependency).
    assert_eq!(engine.metrics().recomputed, 2);
    // Three initial recomputes plus two for the step.
    assert_eq!(engine.metrics().total_recomputed, 5);
}

#[test]
fn closed_gates_consume_the_slot_without_effects() {
    let mut engine = Engine::new(
        CounterEnvironment::new(),
        vec![
            Box::new(
                FixedIntervalReaction::new("gated", 1.0)
                    .writing(1)
                    .when_at_least(0, 1),
            ),
            Box::new(FixedIntervalReaction::new("enable", 5.0).writing(0)),
        ],
        EngineConfig {
            end_time: t(10.0),
            ..EngineConfig::default()
        },
    )
    .unwrap();
    let recorder = TraceRecorder::new();
    engine.add_monitor(Box::new(recorder.clone())).unwrap();
    engine.run_to_end();

    let env = engine.environment();
    assert_eq!(env.counter(0), 2);
    assert_eq!(env.counter(1), 5);
    assert_eq!(engine.metrics().skipped_events, 5);

    let trace = recorder.snapshot();
    let skipped: Vec<_> = trace
        .events()
        .iter()
        .filter(|e| !e.executed)
        .map(|e| e.time)
        .collect();
    assert_eq!(skipped, (1..=5).map(|n| t(f64::from(n))).collect::<Vec<_>>());
}

#[test]
fn ties_fire_in_id_order() {
    let mut engine = Engine::new(
        CounterEnvironment::new(),
        vec![
            Box::new(FixedIntervalReaction::new("a", 1.0)),
            Box::new(FixedIntervalReaction::new("b", 1.0)),
            Box::new(FixedIntervalReaction::new("c", 1.0)),
        ],
        EngineConfig {
            max_steps: Some(6),
            ..EngineConfig::default()
        },
    )
    .unwrap();
    let recorder = TraceRecorder::new();
    engine.add_monitor(Box::new(recorder.clone())).unwrap();
    engine.run_to_end();

    let order: Vec<u32> = recorder.snapshot().firings().map(|(id, _)| id.0).collect();
    assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
}
