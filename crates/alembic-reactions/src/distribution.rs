//! When a reaction fires, given its current propensity.
//!
//! A [`TimeDistribution`] turns a propensity into a putative firing time.
//! [`ExponentialTime`] implements the next-reaction method: a fresh
//! exponential draw when the reaction is first scheduled or has just
//! fired, and a rescaling of the remaining waiting time when only its rate
//! changed. [`DiracComb`] and [`Trigger`] ignore the propensity.

use alembic_core::{ReactionError, Refresh, StepContext, Time};
use rand_distr::{Distribution, Exp};

/// Source of putative firing times.
pub trait TimeDistribution: Send + 'static {
    /// Next putative time for a reaction whose propensity is `rate`.
    ///
    /// Must never return a time before `ctx.now()`.
    fn next_time(
        &mut self,
        rate: f64,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError>;
}

fn check_rate(rate: f64) -> Result<f64, ReactionError> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(rate)
    } else {
        Err(ReactionError::InvalidRate { value: rate })
    }
}

// ── ExponentialTime ──────────────────────────────────────────────

/// Exponentially distributed waiting times (Gibson–Bruck).
///
/// Keeps the last putative time `tau` and the rate it was drawn for. On a
/// dependency refresh with both rates positive the remaining wait is
/// rescaled, `now + (old / new) * (tau - now)`, so no random number is
/// consumed. A zero rate parks the reaction at [`Time::INFINITE`].
#[derive(Clone, Debug)]
pub struct ExponentialTime {
    tau: Time,
    rate: f64,
}

impl ExponentialTime {
    /// A distribution with nothing drawn yet.
    pub fn new() -> Self {
        Self {
            tau: Time::INFINITE,
            rate: 0.0,
        }
    }

    /// The last putative time.
    pub fn putative_time(&self) -> Time {
        self.tau
    }

    fn draw(rate: f64, ctx: &mut StepContext<'_>) -> Result<Time, ReactionError> {
        let exp = Exp::new(rate).map_err(|_| ReactionError::InvalidRate { value: rate })?;
        let wait: f64 = exp.sample(ctx.rng());
        Ok(ctx.now().plus(wait)?)
    }
}

impl Default for ExponentialTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeDistribution for ExponentialTime {
    fn next_time(
        &mut self,
        rate: f64,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        let rate = check_rate(rate)?;
        let now = ctx.now();
        let tau = if rate == 0.0 {
            Time::INFINITE
        } else {
            match refresh {
                Refresh::Dependency if self.rate > 0.0 && self.tau.is_finite() => {
                    let remaining = self.tau.since(now).unwrap_or(0.0);
                    now.plus(self.rate / rate * remaining)?
                }
                _ => Self::draw(rate, ctx)?,
            }
        };
        self.tau = tau;
        self.rate = rate;
        Ok(tau)
    }
}

// ── DiracComb ────────────────────────────────────────────────────

/// Fires at `start`, `start + period`, `start + 2 * period`, ...
#[derive(Clone, Debug)]
pub struct DiracComb {
    start: Time,
    period: f64,
    next: Time,
}

impl DiracComb {
    /// A comb with the given phase and period. `period` must be positive
    /// and finite.
    pub fn new(start: Time, period: f64) -> Result<Self, ReactionError> {
        if !(period.is_finite() && period > 0.0) {
            return Err(ReactionError::InvalidRate { value: period });
        }
        Ok(Self {
            start,
            period,
            next: Time::INFINITE,
        })
    }

    /// First tooth at or after `now`.
    fn first_after(&self, now: Time) -> Result<Time, ReactionError> {
        match now.since(self.start) {
            Some(elapsed) if elapsed > 0.0 => {
                let teeth = (elapsed / self.period).ceil();
                Ok(self.start.plus(teeth * self.period)?)
            }
            _ => Ok(self.start),
        }
    }
}

impl TimeDistribution for DiracComb {
    fn next_time(
        &mut self,
        _rate: f64,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        self.next = match refresh {
            Refresh::Initial => self.first_after(ctx.now())?,
            Refresh::Fired => ctx.now().plus(self.period)?,
            Refresh::Dependency => self.next,
        };
        Ok(self.next)
    }
}

// ── Trigger ──────────────────────────────────────────────────────

/// Fires once at `at` (or immediately, if `at` is already past), then never.
#[derive(Clone, Debug)]
pub struct Trigger {
    at: Time,
    next: Time,
}

impl Trigger {
    /// A one-shot trigger.
    pub fn new(at: Time) -> Self {
        Self {
            at,
            next: Time::INFINITE,
        }
    }
}

impl TimeDistribution for Trigger {
    fn next_time(
        &mut self,
        _rate: f64,
        ctx: &mut StepContext<'_>,
        refresh: Refresh,
    ) -> Result<Time, ReactionError> {
        self.next = match refresh {
            Refresh::Initial => self.at.max(ctx.now()),
            Refresh::Fired => Time::INFINITE,
            Refresh::Dependency => self.next,
        };
        Ok(self.next)
    }
}
