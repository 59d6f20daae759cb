//! Simulated time.
//!
//! [`Time`] is a totally ordered wrapper around `f64` that can never hold
//! NaN or negative infinity. Positive infinity is the distinguished
//! [`Time::INFINITE`] value: a reaction scheduled at `INFINITE` never fires.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::TimeError;

/// A point in simulated time.
///
/// Construction rejects NaN and `-inf`, and normalises `-0.0` to `0.0`,
/// so `Ord` and `Eq` agree with numeric comparison.
///
/// # Examples
///
/// ```
/// use alembic_core::Time;
///
/// let t = Time::new(1.5).unwrap();
/// assert!(t < Time::INFINITE);
/// assert_eq!(t.plus(0.5).unwrap(), Time::new(2.0).unwrap());
/// assert!(Time::INFINITE.plus(3.0).unwrap().is_infinite());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Time(f64);

impl Time {
    /// The origin of simulated time.
    pub const ZERO: Time = Time(0.0);

    /// The "never" sentinel. Compares greater than every finite time.
    pub const INFINITE: Time = Time(f64::INFINITY);

    /// Create a time from a raw value.
    pub fn new(value: f64) -> Result<Self, TimeError> {
        if value.is_nan() {
            return Err(TimeError::NotANumber);
        }
        if value == f64::NEG_INFINITY {
            return Err(TimeError::NegativeInfinity);
        }
        // Adding 0.0 turns -0.0 into +0.0.
        Ok(Self(value + 0.0))
    }

    /// The raw value.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Whether this is [`Time::INFINITE`].
    #[inline]
    pub fn is_infinite(self) -> bool {
        self.0 == f64::INFINITY
    }

    /// Whether this is a finite time.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// The time `delta` after `self`.
    ///
    /// `delta` must be non-negative. `INFINITE` absorbs any delta.
    pub fn plus(self, delta: f64) -> Result<Self, TimeError> {
        if delta.is_nan() {
            return Err(TimeError::NotANumber);
        }
        if delta < 0.0 {
            return Err(TimeError::NegativeDelta { delta });
        }
        Self::new(self.0 + delta)
    }

    /// Elapsed simulated time from `earlier` to `self`, or `None` if
    /// `earlier` is later than `self`.
    pub fn since(self, earlier: Time) -> Option<f64> {
        if earlier > self {
            return None;
        }
        if self.is_infinite() {
            return Some(f64::INFINITY);
        }
        Some(self.0 - earlier.0)
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Time {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl TryFrom<f64> for Time {
    type Error = TimeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "t=inf")
        } else {
            write!(f, "t={}", self.0)
        }
    }
}
