//! Reference diffusion model driven from a background thread.
//!
//! Demonstrates: build profile → spawn engine thread → go_to_time →
//! inspect the environment → add a reaction at runtime → stop.
//!
//! Set `RUST_LOG=alembic_engine=debug` to see engine transitions.

use std::time::Duration;

use alembic_bench::{reference_profile, PRODUCT, SUBSTRATE};
use alembic_core::{ControlError, NodeId, StatusKind, Time};
use alembic_engine::{EngineConfig, EngineHandle};
use alembic_reactions::{ChangeConcentration, ChemicalReaction, GraphEnvironment, MassAction};
use tracing_subscriber::EnvFilter;

const NODES: u32 = 32;

/// Run to `time` and block until the engine has paused there.
fn run_until(handle: &EngineHandle<GraphEnvironment>, time: Time) -> Result<(), ControlError> {
    let changes = handle.subscribe();
    handle.go_to_time(time)?;
    loop {
        match changes.recv_timeout(Duration::from_secs(10)) {
            Ok(change) if change.to.kind() == StatusKind::Paused => return Ok(()),
            Ok(change) if change.to.is_terminal() => {
                return Err(ControlError::EngineTerminated { status: change.to.kind() })
            }
            Ok(_) => {}
            Err(_) => return Err(ControlError::Timeout),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Alembic diffusion demo ({NODES} nodes) ===\n");

    let engine = reference_profile(42, NODES, EngineConfig::default())?;
    let thread = engine.spawn()?;
    let handle = thread.handle();

    for checkpoint in [1.0, 5.0, 20.0] {
        run_until(handle, Time::new(checkpoint)?)?;

        let (view, spread, product) = handle
            .inspect(|env, view| {
                let spread: Vec<f64> = env
                    .nodes()
                    .map(|n| env.concentration(n, SUBSTRATE))
                    .collect();
                (*view, spread, env.total(PRODUCT))
            })?
            .wait()?;
        let (step, now) = (view.step, view.now);
        let occupied = spread.iter().filter(|&&c| c > 0.0).count();
        let peak = spread.iter().copied().fold(0.0, f64::max);
        println!(
            "  t={:>6.2} step={:>7}: occupied={:>2}/{NODES}, peak={:>6.1}, product={:>6.1}",
            now.as_f64(),
            step.0,
            occupied,
            peak,
            product,
        );
    }

    // A sink on the far side of the ring, added while the engine is paused.
    let sink = ChemicalReaction::<GraphEnvironment>::builder("sink")
        .on_node(NodeId(NODES / 2))
        .rate(5.0)
        .condition(MassAction { molecule: SUBSTRATE, count: 1 })
        .effect(ChangeConcentration { molecule: SUBSTRATE, delta: -1.0 })
        .build()?;
    let id = handle.add_reaction(Box::new(sink))?.wait()?;
    tracing::info!(reaction = ?id, "sink added");

    run_until(handle, Time::new(40.0)?)?;

    let engine = thread.shutdown()?;
    let env = engine.environment();
    println!(
        "Stopped at t={:.2} after {} steps: substrate={:.1}, product={:.1}",
        engine.now().as_f64(),
        engine.step_count().0,
        env.total(SUBSTRATE),
        env.total(PRODUCT),
    );
    println!("Last step recomputed {} reactions", engine.metrics().recomputed);
    Ok(())
}
