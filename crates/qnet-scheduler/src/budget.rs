//! Run budgets bounding runaway simulations

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits on one scheduler's work. Exhaustion truncates, it does not fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBudget {
    /// Maximum events dispatched over the scheduler's lifetime
    pub max_events: Option<u64>,
    /// Maximum wall-clock time, measured from the first run
    pub max_wall_clock: Option<Duration>,
}

impl RunBudget {
    /// No limits
    pub fn unlimited() -> Self {
        RunBudget::default()
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    pub fn with_max_wall_clock(mut self, limit: Duration) -> Self {
        self.max_wall_clock = Some(limit);
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_events.is_none() && self.max_wall_clock.is_none()
    }

    /// What is left after `events_used` events and `elapsed` wall-clock time
    pub fn remaining(&self, events_used: u64, elapsed: Duration) -> RunBudget {
        RunBudget {
            max_events: self.max_events.map(|max| max.saturating_sub(events_used)),
            max_wall_clock: self.max_wall_clock.map(|max| max.saturating_sub(elapsed)),
        }
    }

    pub(crate) fn events_exhausted(&self, dispatched: u64) -> bool {
        self.max_events.is_some_and(|max| dispatched >= max)
    }

    pub(crate) fn wall_clock_exhausted(&self, elapsed: Duration) -> bool {
        self.max_wall_clock.is_some_and(|max| elapsed >= max)
    }
}
