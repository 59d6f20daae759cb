//! Event traces for replay comparison.
//!
//! Two runs with the same seed and initial state must fire the same
//! reactions at the same times. [`Trace::fingerprint`] reduces a trace to
//! one number so determinism checks are a single comparison.

use std::sync::{Arc, Mutex};

use alembic_core::{Environment, ReactionId, Time};

use crate::command::EngineView;
use crate::monitor::{OutputMonitor, StepEvent};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// The ordered events of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace {
    events: Vec<StepEvent>,
    finished: bool,
}

impl Trace {
    /// Events in firing order.
    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the engine reported a terminal status.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `(reaction, time)` pairs in firing order.
    pub fn firings(&self) -> impl Iterator<Item = (ReactionId, Time)> + '_ {
        self.events.iter().map(|e| (e.reaction, e.time))
    }

    /// FNV-1a hash over `(reaction, time bits, executed)` of every event.
    pub fn fingerprint(&self) -> u64 {
        let mut hash = FNV_OFFSET;
        let mut feed = |bytes: &[u8]| {
            for &b in bytes {
                hash ^= u64::from(b);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        };
        for e in &self.events {
            feed(&e.reaction.0.to_le_bytes());
            feed(&e.time.as_f64().to_bits().to_le_bytes());
            feed(&[u8::from(e.executed)]);
        }
        hash
    }
}

/// Monitor that records a [`Trace`]. Clones share the same trace.
#[derive(Clone, Debug, Default)]
pub struct TraceRecorder {
    trace: Arc<Mutex<Trace>>,
}

impl TraceRecorder {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn snapshot(&self) -> Trace {
        self.trace.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.trace.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Environment> OutputMonitor<E> for TraceRecorder {
    fn step_done(&mut self, _env: &E, event: &StepEvent) {
        self.trace
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .events
            .push(*event);
    }

    fn finished(&mut self, _env: &E, _view: &EngineView) {
        self.trace.lock().unwrap_or_else(|e| e.into_inner()).finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_core::Step;
    use alembic_test_utils::CounterEnvironment;

    fn event(step: u64, reaction: u32, time: f64) -> StepEvent {
        StepEvent {
            step: Step(step),
            time: Time::new(time).unwrap(),
            reaction: ReactionId(reaction),
            executed: true,
        }
    }

    #[test]
    fn clones_share_one_trace() {
        let recorder = TraceRecorder::new();
        let mut monitor = recorder.clone();
        let env = CounterEnvironment::new();
        OutputMonitor::<CounterEnvironment>::step_done(&mut monitor, &env, &event(1, 0, 1.0));
        assert_eq!(recorder.len(), 1);
        assert_eq!(
            recorder.snapshot().firings().collect::<Vec<_>>(),
            vec![(ReactionId(0), Time::new(1.0).unwrap())]
        );
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let a = Trace {
            events: vec![event(1, 0, 1.0), event(2, 1, 2.0)],
            finished: true,
        };
        let b = Trace {
            events: vec![event(1, 1, 1.0), event(2, 0, 2.0)],
            finished: true,
        };
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(Trace::default().fingerprint(), FNV_OFFSET);
    }
}
