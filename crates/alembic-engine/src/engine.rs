//! The engine: a single-threaded next-reaction loop.
//!
//! [`Engine`] wires together the environment, the reaction arena, the
//! scheduler and the dependency graph. One step:
//!
//! 1. take the earliest `(time, id)` from the scheduler; nothing left, or
//!    past `end_time`, terminates the run;
//! 2. advance simulated time, refusing to go backwards;
//! 3. if the reaction's conditions hold, apply its effects;
//! 4. recompute the fired reaction, then every reaction it affects;
//! 5. apply environment change notifications (removed nodes, changed
//!    neighbourhoods);
//! 6. count the step and notify monitors.
//!
//! Commands from [`EngineHandle`]s are applied only between steps.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alembic_core::{
    ControlError, EngineStatus, Environment, EnvironmentChange, InfluenceSet, Reaction,
    ReactionError, ReactionId, ReactionPhase, Refresh, ScheduleError, SimRng, StatusKind, Step,
    StepContext, StepError, Time,
};
use alembic_schedule::{DependencyGraph, IndexedHeap, Scheduler};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rand::SeedableRng;

use crate::arena::ReactionArena;
use crate::command::{Command, EngineView};
use crate::config::{ConfigError, EngineConfig};
use crate::control::EngineHandle;
use crate::metrics::StepMetrics;
use crate::monitor::{OutputMonitor, StepEvent};
use crate::status::StatusCell;

// ── Progress ─────────────────────────────────────────────────────

/// What a call to [`Engine::tick`] achieved.
#[derive(Clone, Debug, PartialEq)]
pub enum Progress {
    /// One step was executed.
    Stepped(StepEvent),
    /// No step was executed: the engine is ready or paused.
    Idle,
    /// The engine is in a terminal status.
    Halted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PauseTarget {
    Step(Step),
    Time(Time),
}

/// How long an idle [`Engine::run`] waits on the queue before checking
/// whether any handle is still alive.
const IDLE_POLL: Duration = Duration::from_millis(20);

enum StepOutcome {
    Fired(StepEvent),
    Exhausted,
    LimitReached,
}

// ── Engine ───────────────────────────────────────────────────────

/// Discrete-event simulation engine.
///
/// Owns all simulation state and executes steps synchronously on the
/// calling thread. Use [`spawn`](Self::spawn) to run it in the background.
pub struct Engine<E: Environment> {
    environment: E,
    reactions: ReactionArena<E>,
    scheduler: Box<dyn Scheduler>,
    graph: DependencyGraph,
    rng: SimRng,
    now: Time,
    step: Step,
    config: EngineConfig,
    pause_at: Option<PauseTarget>,
    commands_rx: Receiver<Command<E>>,
    commands_tx: Sender<Command<E>>,
    // One strong count per live handle, plus the engine's own.
    controllers: Arc<()>,
    status: Arc<StatusCell>,
    monitors: Vec<Box<dyn OutputMonitor<E>>>,
    metrics: StepMetrics,
    scratch: Vec<ReactionId>,
}

impl<E: Environment> Engine<E> {
    /// Build an engine scheduling with an [`IndexedHeap`].
    ///
    /// Every reaction gets a stable id in input order, is registered in
    /// the dependency graph, and is recomputed with [`Refresh::Initial`].
    pub fn new(
        environment: E,
        reactions: Vec<Box<dyn Reaction<E>>>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        let scheduler = Box::new(IndexedHeap::with_capacity(reactions.len()));
        Self::with_scheduler(environment, reactions, config, scheduler)
    }

    /// Build an engine with a caller-supplied scheduler.
    ///
    /// The scheduler must be empty.
    pub fn with_scheduler(
        environment: E,
        reactions: Vec<Box<dyn Reaction<E>>>,
        config: EngineConfig,
        mut scheduler: Box<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if u32::try_from(reactions.len()).is_err() {
            return Err(ConfigError::TooManyReactions {
                count: reactions.len(),
            });
        }
        scheduler.clear();

        let (commands_tx, commands_rx) = crossbeam_channel::bounded(config.command_queue_capacity);
        let count = reactions.len();
        let mut engine = Self {
            environment,
            reactions: ReactionArena::with_capacity(count),
            scheduler,
            graph: DependencyGraph::new(),
            rng: SimRng::seed_from_u64(config.seed),
            now: config.start_time,
            step: Step(0),
            pause_at: None,
            commands_rx,
            commands_tx,
            controllers: Arc::new(()),
            status: Arc::new(StatusCell::new()),
            monitors: Vec::new(),
            metrics: StepMetrics::default(),
            scratch: Vec::new(),
            config,
        };
        for reaction in reactions {
            engine.insert_reaction(reaction)?;
        }
        // Structural changes made while building the environment are
        // already reflected in the initial influence sets.
        engine.environment.drain_changes();
        tracing::debug!(
            reactions = count,
            edges = engine.graph.edge_count(),
            seed = engine.config.seed,
            "engine initialised"
        );
        Ok(engine)
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Current simulated time.
    pub fn now(&self) -> Time {
        self.now
    }

    /// Steps completed.
    pub fn step_count(&self) -> Step {
        self.step
    }

    /// Current status.
    pub fn status(&self) -> EngineStatus {
        self.status.get()
    }

    /// The failure cause, if the engine stopped with an error.
    pub fn error(&self) -> Option<StepError> {
        self.status.get().error().cloned()
    }

    /// The environment.
    pub fn environment(&self) -> &E {
        &self.environment
    }

    /// Consume the engine and return its environment.
    pub fn into_environment(self) -> E {
        self.environment
    }

    /// Metrics from the most recent step plus cumulative counters.
    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Putative time of `id`, if it is scheduled.
    pub fn scheduled_time(&self, id: ReactionId) -> Option<Time> {
        self.scheduler.time_of(id)
    }

    /// The dependency graph over live reactions.
    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Number of live reactions.
    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    /// Live reaction ids, ascending.
    pub fn reaction_ids(&self) -> impl Iterator<Item = ReactionId> + '_ {
        self.reactions.ids()
    }

    /// Name of reaction `id`, if it is live.
    pub fn reaction_name(&self, id: ReactionId) -> Option<&str> {
        self.reactions.get(id).map(|r| r.name())
    }

    /// Read-only summary of the current state.
    pub fn view(&self) -> EngineView {
        EngineView {
            now: self.now,
            step: self.step,
            status: self.status.kind(),
            reactions: self.reactions.len(),
        }
    }

    /// A remote control for this engine.
    pub fn handle(&self) -> EngineHandle<E> {
        EngineHandle::new(
            self.commands_tx.clone(),
            Arc::clone(&self.status),
            Arc::clone(&self.controllers),
        )
    }

    /// The shared status cell.
    pub fn status_cell(&self) -> Arc<StatusCell> {
        Arc::clone(&self.status)
    }

    // ── Direct control ───────────────────────────────────────────

    fn ensure_live(&self) -> Result<(), ControlError> {
        let status = self.status.kind();
        if status.is_terminal() {
            return Err(ControlError::EngineTerminated { status });
        }
        Ok(())
    }

    /// Start or resume execution.
    pub fn play(&mut self) -> Result<(), ControlError> {
        self.ensure_live()?;
        self.on_play();
        Ok(())
    }

    /// Suspend at the current boundary.
    pub fn pause(&mut self) -> Result<(), ControlError> {
        self.ensure_live()?;
        self.on_pause();
        Ok(())
    }

    /// Discard the remaining schedule and terminate. Idempotent.
    pub fn stop(&mut self) {
        self.terminate();
    }

    /// Run until `step` steps have completed, then pause.
    pub fn go_to_step(&mut self, step: u64) -> Result<(), ControlError> {
        self.ensure_live()?;
        self.on_go_to(PauseTarget::Step(Step(step)));
        Ok(())
    }

    /// Run until the next event would be later than `time`, then pause.
    pub fn go_to_time(&mut self, time: Time) -> Result<(), ControlError> {
        self.ensure_live()?;
        self.on_go_to(PauseTarget::Time(time));
        Ok(())
    }

    /// Insert a reaction and schedule it.
    ///
    /// Returns `None` if the reaction failed its first scheduling; it is
    /// then discarded and the engine keeps running.
    pub fn add_reaction(
        &mut self,
        reaction: Box<dyn Reaction<E>>,
    ) -> Result<Option<ReactionId>, ControlError> {
        self.ensure_live()?;
        Ok(self.on_add_reaction(reaction))
    }

    /// Remove a reaction. Returns whether it was present.
    pub fn remove_reaction(&mut self, id: ReactionId) -> Result<bool, ControlError> {
        self.ensure_live()?;
        Ok(self.on_remove_reaction(id))
    }

    /// Attach a monitor.
    pub fn add_monitor(
        &mut self,
        monitor: Box<dyn OutputMonitor<E>>,
    ) -> Result<(), ControlError> {
        self.ensure_live()?;
        self.on_add_monitor(monitor);
        Ok(())
    }

    // ── Driving ──────────────────────────────────────────────────

    /// Apply queued commands, then execute at most one step.
    pub fn tick(&mut self) -> Progress {
        self.process_commands();
        self.apply_pause_target();
        match self.status.kind() {
            StatusKind::Running => {}
            k if k.is_terminal() => return Progress::Halted,
            _ => return Progress::Idle,
        }
        match self.advance() {
            Some(event) => {
                self.apply_pause_target();
                Progress::Stepped(event)
            }
            None if self.status.kind().is_terminal() => Progress::Halted,
            None => Progress::Idle,
        }
    }

    /// Run until a terminal status, blocking on the command queue while
    /// ready or paused.
    ///
    /// An idle engine with no live [`EngineHandle`] and nothing queued can
    /// never be resumed, so it terminates.
    pub fn run(&mut self) -> EngineStatus {
        loop {
            match self.status.kind() {
                k if k.is_terminal() => break,
                StatusKind::Running => {
                    self.tick();
                }
                _ if self.commands_rx.is_empty() && !self.has_controllers() => {
                    tracing::debug!(step = %self.step, "idle with no handles left");
                    self.terminate();
                }
                _ => match self.commands_rx.recv_timeout(IDLE_POLL) {
                    Ok(command) => {
                        self.apply_command(command);
                        self.tick();
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => self.terminate(),
                },
            }
        }
        self.status.get()
    }

    /// Play and run until a terminal status.
    ///
    /// Pause targets and queued `Pause` commands do not stop it: the engine
    /// resumes at once. Other queued commands are applied as usual.
    pub fn run_to_end(&mut self) -> EngineStatus {
        self.pause_at = None;
        loop {
            match self.tick() {
                Progress::Halted => break,
                Progress::Stepped(_) => {}
                Progress::Idle => {
                    self.pause_at = None;
                    self.on_play();
                }
            }
        }
        self.status.get()
    }

    fn has_controllers(&self) -> bool {
        Arc::strong_count(&self.controllers) > 1
    }

    fn advance(&mut self) -> Option<StepEvent> {
        match self.run_step() {
            Ok(StepOutcome::Fired(event)) => {
                for monitor in &mut self.monitors {
                    monitor.step_done(&self.environment, &event);
                }
                if self.config.max_steps.is_some_and(|max| self.step.0 >= max) {
                    self.terminate();
                }
                Some(event)
            }
            Ok(StepOutcome::Exhausted) => {
                tracing::debug!(step = %self.step, time = %self.now, "schedule exhausted");
                self.terminate();
                None
            }
            Ok(StepOutcome::LimitReached) => {
                tracing::debug!(step = %self.step, time = %self.now, "run limit reached");
                self.terminate();
                None
            }
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn run_step(&mut self) -> Result<StepOutcome, StepError> {
        if self.config.max_steps.is_some_and(|max| self.step.0 >= max) {
            return Ok(StepOutcome::LimitReached);
        }
        let (id, time) = match self.scheduler.next_reaction() {
            Ok(next) => next,
            Err(ScheduleError::Empty) => return Ok(StepOutcome::Exhausted),
            Err(e) => return Err(invariant(e)),
        };
        if time > self.config.end_time {
            return Ok(StepOutcome::LimitReached);
        }
        if time < self.now {
            tracing::warn!(
                current = %self.now,
                requested = %time,
                reaction = %id,
                "time regression"
            );
            return Err(StepError::TimeRegression {
                current: self.now,
                requested: time,
            });
        }

        let started = Instant::now();
        self.metrics.begin_step();
        self.now = time;

        let executed = self.execute(id)?;
        let applied = Instant::now();
        self.metrics.apply_us = (applied - started).as_micros() as u64;

        self.reschedule(id, Refresh::Fired)?;
        if executed {
            let mut affected = std::mem::take(&mut self.scratch);
            affected.clear();
            affected.extend(
                self.graph
                    .affected_by(id)
                    .map_err(invariant)?
                    .iter()
                    .copied()
                    .filter(|&other| other != id),
            );
            let result = affected
                .iter()
                .try_for_each(|&other| self.reschedule(other, Refresh::Dependency));
            self.scratch = affected;
            result?;
        } else {
            self.metrics.skipped_events += 1;
        }
        let rescheduled = Instant::now();
        self.metrics.reschedule_us = (rescheduled - applied).as_micros() as u64;

        self.process_environment_changes()?;
        self.metrics.environment_us = rescheduled.elapsed().as_micros() as u64;

        self.step = self.step.next();
        self.metrics.steps += 1;
        self.metrics.total_us = started.elapsed().as_micros() as u64;
        tracing::trace!(step = %self.step, %time, reaction = %id, executed, "step");
        Ok(StepOutcome::Fired(StepEvent {
            step: self.step,
            time,
            reaction: id,
            executed,
        }))
    }

    // ── Reaction plumbing ────────────────────────────────────────

    fn reaction_failed(
        &self,
        id: ReactionId,
        phase: ReactionPhase,
        reason: ReactionError,
    ) -> StepError {
        let name = self.reactions.name(id);
        tracing::warn!(reaction = %id, %name, %phase, %reason, "reaction failed");
        StepError::ReactionFailed {
            reaction: id,
            name,
            phase,
            reason,
        }
    }

    fn missing(id: ReactionId) -> StepError {
        StepError::InvariantViolated {
            reason: format!("reaction {id} is scheduled but not stored"),
        }
    }

    /// Check the gate and apply effects. Returns whether effects ran.
    fn execute(&mut self, id: ReactionId) -> Result<bool, StepError> {
        let (now, step) = (self.now, self.step);
        let reaction = self.reactions.get_mut(id).ok_or_else(|| Self::missing(id))?;
        let env = &mut self.environment;
        let rng = &mut self.rng;

        match catch(|| Ok(reaction.can_execute(&*env))) {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(reason) => return Err(self.reaction_failed(id, ReactionPhase::Condition, reason)),
        }
        let applied = catch(|| {
            let mut ctx = StepContext::new(now, step, rng);
            reaction.apply(env, &mut ctx)
        });
        applied
            .map(|()| true)
            .map_err(|reason| self.reaction_failed(id, ReactionPhase::Apply, reason))
    }

    fn recompute(&mut self, id: ReactionId, refresh: Refresh) -> Result<Time, StepError> {
        let (now, step) = (self.now, self.step);
        let reaction = self.reactions.get_mut(id).ok_or_else(|| Self::missing(id))?;
        let env = &self.environment;
        let rng = &mut self.rng;
        let time = catch(|| {
            let mut ctx = StepContext::new(now, step, rng);
            reaction.recompute(env, &mut ctx, refresh)
        });
        self.metrics.record_recompute();
        time.map_err(|reason| self.reaction_failed(id, ReactionPhase::Recompute, reason))
    }

    fn reschedule(&mut self, id: ReactionId, refresh: Refresh) -> Result<(), StepError> {
        let time = self.recompute(id, refresh)?;
        self.scheduler.update(id, time).map_err(invariant)
    }

    fn influence_of(&self, id: ReactionId) -> Result<InfluenceSet, StepError> {
        let reaction = self.reactions.get(id).ok_or_else(|| Self::missing(id))?;
        let env = &self.environment;
        catch(|| Ok(reaction.influence_set(env)))
            .map_err(|reason| self.reaction_failed(id, ReactionPhase::Influence, reason))
    }

    /// Store, connect and schedule a reaction. On failure nothing of it
    /// remains in the engine.
    fn insert_reaction(&mut self, reaction: Box<dyn Reaction<E>>) -> Result<ReactionId, StepError> {
        let id = self
            .reactions
            .insert(reaction)
            .ok_or_else(|| StepError::InvariantViolated {
                reason: "reaction id space exhausted".into(),
            })?;
        match self.register(id) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.discard_reaction(id);
                Err(e)
            }
        }
    }

    fn register(&mut self, id: ReactionId) -> Result<(), StepError> {
        let influence = self.influence_of(id)?;
        self.graph.add_reaction(id, influence).map_err(invariant)?;
        let time = self.recompute(id, Refresh::Initial)?;
        self.scheduler.add_reaction(id, time).map_err(invariant)
    }

    /// Drop a reaction from every structure. Returns whether it was live.
    fn discard_reaction(&mut self, id: ReactionId) -> bool {
        let present = self.reactions.remove(id).is_some();
        let _ = self.graph.remove_reaction(id);
        let _ = self.scheduler.remove_reaction(id);
        present
    }

    fn process_environment_changes(&mut self) -> Result<(), StepError> {
        let changes = self.environment.drain_changes();
        self.metrics.environment_changes = u32::try_from(changes.len()).unwrap_or(u32::MAX);
        for change in changes {
            match change {
                EnvironmentChange::NodeRemoved(node) => {
                    let ids = self.reactions.on_node(node).to_vec();
                    for id in ids {
                        self.discard_reaction(id);
                        self.metrics.reactions_removed += 1;
                    }
                    tracing::debug!(%node, "node removed");
                }
                EnvironmentChange::NeighbourhoodChanged(node) => {
                    let ids = self.reactions.on_node(node).to_vec();
                    for id in ids {
                        let influence = self.influence_of(id)?;
                        if self.graph.update_influence(id, influence).map_err(invariant)? {
                            self.reschedule(id, Refresh::Dependency)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ── Status and commands ──────────────────────────────────────

    fn set_status(&self, next: EngineStatus) -> bool {
        self.status.transition(next, self.step, self.now)
    }

    fn on_play(&mut self) {
        if matches!(self.status.kind(), StatusKind::Ready | StatusKind::Paused) {
            self.set_status(EngineStatus::Running);
        }
    }

    fn on_pause(&mut self) {
        self.pause_at = None;
        if self.status.kind() == StatusKind::Running {
            self.set_status(EngineStatus::Paused);
        }
    }

    fn on_go_to(&mut self, target: PauseTarget) {
        self.pause_at = Some(target);
        self.on_play();
    }

    fn on_add_reaction(&mut self, reaction: Box<dyn Reaction<E>>) -> Option<ReactionId> {
        let name = reaction.name().to_owned();
        match self.insert_reaction(reaction) {
            Ok(id) => {
                self.metrics.reactions_added += 1;
                tracing::debug!(reaction = %id, %name, "reaction added");
                Some(id)
            }
            Err(error) => {
                tracing::warn!(%name, %error, "reaction rejected");
                None
            }
        }
    }

    fn on_add_monitor(&mut self, mut monitor: Box<dyn OutputMonitor<E>>) {
        monitor.initialized(&self.environment, &self.view());
        self.monitors.push(monitor);
    }

    fn on_remove_reaction(&mut self, id: ReactionId) -> bool {
        let removed = self.discard_reaction(id);
        if removed {
            self.metrics.reactions_removed += 1;
            tracing::debug!(reaction = %id, "reaction removed");
        }
        removed
    }

    fn apply_command(&mut self, command: Command<E>) {
        if self.status.kind().is_terminal() {
            return;
        }
        self.metrics.commands_applied += 1;
        match command {
            Command::Play => self.on_play(),
            Command::Pause => self.on_pause(),
            Command::Stop => self.terminate(),
            Command::GoToStep(step) => self.on_go_to(PauseTarget::Step(step)),
            Command::GoToTime(time) => self.on_go_to(PauseTarget::Time(time)),
            Command::AddReaction(reaction, reply) => {
                let id = self.on_add_reaction(reaction);
                let _ = reply.send(id);
            }
            Command::RemoveReaction(id, reply) => {
                let removed = self.on_remove_reaction(id);
                let _ = reply.send(removed);
            }
            Command::Inspect(f) => f(&self.environment, &self.view()),
            Command::AddMonitor(monitor) => self.on_add_monitor(monitor),
        }
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.commands_rx.try_recv() {
            self.apply_command(command);
        }
    }

    fn apply_pause_target(&mut self) {
        if self.status.kind() != StatusKind::Running {
            return;
        }
        let reached = match self.pause_at {
            None => false,
            Some(PauseTarget::Step(target)) => self.step >= target,
            Some(PauseTarget::Time(limit)) => match self.scheduler.next_reaction() {
                Ok((_, next)) => next > limit,
                Err(_) => false,
            },
        };
        if reached {
            self.pause_at = None;
            self.set_status(EngineStatus::Paused);
        }
    }

    fn terminate(&mut self) {
        if !self.set_status(EngineStatus::Terminated) {
            return;
        }
        self.scheduler.clear();
        self.pause_at = None;
        self.finish();
    }

    fn fail(&mut self, error: StepError) {
        tracing::warn!(step = %self.step, time = %self.now, %error, "engine failed");
        if self.set_status(EngineStatus::Error(error)) {
            self.finish();
        }
    }

    fn finish(&mut self) {
        let view = self.view();
        for monitor in &mut self.monitors {
            monitor.finished(&self.environment, &view);
        }
        // Pending replies can never be answered now.
        while self.commands_rx.try_recv().is_ok() {}
    }
}

impl<E: Environment> std::fmt::Debug for Engine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("status", &self.status.kind())
            .field("now", &self.now)
            .field("step", &self.step)
            .field("reactions", &self.reactions.len())
            .field("scheduled", &self.scheduler.len())
            .finish()
    }
}

fn invariant(e: impl std::fmt::Display) -> StepError {
    StepError::InvariantViolated {
        reason: e.to_string(),
    }
}

/// Run reaction code, turning a panic into [`ReactionError::Panicked`].
fn catch<T>(f: impl FnOnce() -> Result<T, ReactionError>) -> Result<T, ReactionError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ReactionError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
