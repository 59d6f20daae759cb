//! Integration test: structural changes reported by the environment.
//!
//! Removing a node drops the reactions attached to it; changing a node's
//! neighbourhood refreshes the influence sets of its reactions.

use std::sync::atomic::Ordering;

use alembic_core::{
    Element, EngineStatus, Environment, EnvironmentChange, InfluenceSet, NodeId, Reaction,
    ReactionError, ReactionId, Refresh, StepContext, Time,
};
use alembic_engine::{Engine, EngineConfig};
use alembic_test_utils::{CounterEnvironment, FixedIntervalReaction};

fn t(value: f64) -> Time {
    Time::new(value).unwrap()
}

/// Fires once at `at` and applies `edit` to the environment.
struct Surgeon {
    at: Time,
    edit: fn(&mut CounterEnvironment),
}

impl Reaction<CounterEnvironment> for Surgeon {
    fn name(&self) -> &str {
        "surgeon"
    }

    fn influence_set(&self, _env: &CounterEnvironment) -> InfluenceSet {
        InfluenceSet::none()
    }

    fn recompute(
        &mut self,
        _env: &CounterEnvironment,
        _ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        Ok(match refresh {
            Refresh::Initial => self.at,
            _ => Time::INFINITE,
        })
    }

    fn apply(
        &mut self,
        env: &mut CounterEnvironment,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ReactionError> {
        (self.edit)(env);
        Ok(())
    }
}

#[test]
fn removed_nodes_take_their_reactions() {
    let doomed = FixedIntervalReaction::new("doomed", 1.0).on_node(NodeId(1));
    let survivor = FixedIntervalReaction::new("survivor", 1.0).on_node(NodeId(2));
    let (doomed_fired, survivor_fired) = (doomed.fired(), survivor.fired());

    let mut engine = Engine::new(
        CounterEnvironment::with_nodes(3),
        vec![
            Box::new(doomed),
            Box::new(survivor),
            Box::new(Surgeon {
                at: t(2.5),
                edit: |env| env.remove_node(NodeId(1)),
            }),
        ],
        EngineConfig {
            end_time: t(5.0),
            ..EngineConfig::default()
        },
    )
    .unwrap();
    assert_eq!(engine.run_to_end(), EngineStatus::Terminated);

    assert_eq!(doomed_fired.load(Ordering::Relaxed), 2);
    assert_eq!(survivor_fired.load(Ordering::Relaxed), 5);
    assert_eq!(engine.reaction_count(), 2);
    assert_eq!(engine.reaction_name(ReactionId(0)), None);
    assert!(!engine.dependency_graph().contains(ReactionId(0)));
    assert_eq!(engine.metrics().reactions_removed, 1);
    assert!(!engine.environment().contains_node(NodeId(1)));
}

#[test]
fn neighbourhood_changes_refresh_influence() {
    let mut engine = Engine::new(
        CounterEnvironment::with_nodes(3),
        vec![
            Box::new(
                FixedIntervalReaction::new("watcher", 1.0)
                    .on_node(NodeId(0))
                    .reading_neighbours(7),
            ),
            Box::new(Surgeon {
                at: t(1.5),
                edit: |env| env.connect(NodeId(0), NodeId(2)),
            }),
        ],
        EngineConfig {
            end_time: t(3.0),
            ..EngineConfig::default()
        },
    )
    .unwrap();
    let watched = Element::node(NodeId(2), 7);
    let reads = |engine: &Engine<CounterEnvironment>| {
        engine
            .dependency_graph()
            .influence(ReactionId(0))
            .map(|i| i.reads.contains(&watched))
    };
    assert_eq!(reads(&engine), Some(false));

    engine.run_to_end();
    assert_eq!(engine.status(), EngineStatus::Terminated);
    assert_eq!(reads(&engine), Some(true));
    assert_eq!(engine.environment().neighbours(NodeId(0)).as_slice(), &[NodeId(2)]);
}

#[test]
fn changes_made_before_construction_are_ignored() {
    let mut env = CounterEnvironment::with_nodes(2);
    env.connect(NodeId(0), NodeId(1));
    env.push_change(EnvironmentChange::NodeRemoved(NodeId(0)));

    let engine = Engine::new(
        env,
        vec![Box::new(
            FixedIntervalReaction::new("kept", 1.0).on_node(NodeId(0)),
        )],
        EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(engine.reaction_count(), 1);
    assert_eq!(engine.environment().pending_changes(), 0);
}

#[test]
fn change_counts_are_reported_per_step() {
    let mut engine = Engine::new(
        CounterEnvironment::with_nodes(3),
        vec![Box::new(Surgeon {
            at: t(1.0),
            edit: |env| env.connect(NodeId(0), NodeId(1)),
        })],
        EngineConfig::default(),
    )
    .unwrap();
    engine.play().unwrap();
    engine.tick();
    assert_eq!(engine.metrics().environment_changes, 2);
}
