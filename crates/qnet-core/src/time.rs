//! Simulation time
//!
//! Time in the discrete-event engine is a non-negative, finite count of
//! nanoseconds since the start of a shot. It is stored as `f64` so that
//! fibre delays of arbitrary length stay exact enough for ordering, and it
//! carries a total order so it can key the event queue.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::{QnetError, QnetResult};

/// Simulation timestamp in nanoseconds
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SimTime(f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    /// Create a timestamp, rejecting negative and non-finite values
    pub fn from_nanos(nanos: f64) -> QnetResult<Self> {
        if nanos.is_finite() && nanos >= 0.0 {
            // Normalise -0.0 so equal times compare equal bitwise too
            Ok(SimTime(nanos + 0.0))
        } else {
            Err(QnetError::InvalidTimestamp(nanos))
        }
    }

    pub fn from_micros(micros: f64) -> QnetResult<Self> {
        Self::from_nanos(micros * 1_000.0)
    }

    pub fn from_secs_f64(secs: f64) -> QnetResult<Self> {
        Self::from_nanos(secs * 1_000_000_000.0)
    }

    #[inline]
    pub fn as_nanos(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn as_micros(self) -> f64 {
        self.0 / 1_000.0
    }

    #[inline]
    pub fn as_millis(self) -> f64 {
        self.0 / 1_000_000.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 / 1_000_000_000.0
    }
}

impl Eq for SimTime {}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for SimTime {
    type Output = SimTime;

    #[inline]
    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    /// Saturates at zero
    #[inline]
    fn sub(self, rhs: SimTime) -> Self::Output {
        SimTime((self.0 - rhs.0).max(0.0))
    }
}

impl TryFrom<f64> for SimTime {
    type Error = QnetError;

    fn try_from(nanos: f64) -> Result<Self, Self::Error> {
        SimTime::from_nanos(nanos)
    }
}

impl From<SimTime> for f64 {
    fn from(t: SimTime) -> f64 {
        t.0
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t({:.3}µs)", self.as_micros())
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}µs", self.as_micros())
    }
}
