//! Per-step performance metrics for the engine.
//!
//! [`StepMetrics`] captures timing of the most recent step plus cumulative
//! counters for the whole run.

/// Timing and bookkeeping metrics.
///
/// Durations are in microseconds and describe the most recent step.
/// Fields documented as cumulative count from engine construction.
#[derive(Clone, Debug, Default)]
pub struct StepMetrics {
    /// Wall-clock time for the entire step, in microseconds.
    pub total_us: u64,
    /// Time spent in the fired reaction's condition check and effects.
    pub apply_us: u64,
    /// Time spent recomputing and rescheduling reactions.
    pub reschedule_us: u64,
    /// Time spent applying environment change notifications.
    pub environment_us: u64,
    /// Reactions recomputed during the step, the fired one included.
    pub recomputed: u32,
    /// Environment changes processed during the step.
    pub environment_changes: u32,
    /// Cumulative number of completed steps.
    pub steps: u64,
    /// Cumulative number of steps whose reaction was gated off.
    pub skipped_events: u64,
    /// Cumulative number of reactions recomputed.
    pub total_recomputed: u64,
    /// Cumulative number of reactions added after construction.
    pub reactions_added: u64,
    /// Cumulative number of reactions removed.
    pub reactions_removed: u64,
    /// Cumulative number of commands applied.
    pub commands_applied: u64,
}

impl StepMetrics {
    pub(crate) fn begin_step(&mut self) {
        self.total_us = 0;
        self.apply_us = 0;
        self.reschedule_us = 0;
        self.environment_us = 0;
        self.recomputed = 0;
        self.environment_changes = 0;
    }

    pub(crate) fn record_recompute(&mut self) {
        self.recomputed = self.recomputed.saturating_add(1);
        self.total_recomputed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StepMetrics::default();
        assert_eq!(m.total_us, 0);
        assert_eq!(m.recomputed, 0);
        assert_eq!(m.steps, 0);
        assert_eq!(m.commands_applied, 0);
    }

    #[test]
    fn begin_step_keeps_cumulative_counters() {
        let mut m = StepMetrics::default();
        m.record_recompute();
        m.record_recompute();
        m.steps = 4;
        m.apply_us = 12;
        m.begin_step();
        assert_eq!(m.recomputed, 0);
        assert_eq!(m.apply_us, 0);
        assert_eq!(m.total_recomputed, 2);
        assert_eq!(m.steps, 4);
    }
}
