//! Event vocabulary for the discrete-event engine
//!
//! The set of event kinds is closed. Protocols react to them through a
//! fixed handler table (one method per kind), so adding a kind is a
//! compile-time change everywhere it must be handled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SimTime;

/// What happens at an event, with the index it refers to.
///
/// `link` indexes the channel a photon travels on; `station` indexes the
/// node performing a Bell-state measurement. Both are local to the
/// protocol instance that scheduled the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A source emits a photon into a channel
    Emit { link: usize },
    /// The photon reaches the far end of the channel (or is lost)
    LossDecision { link: usize },
    /// A station starts a Bell-state measurement
    Measure { station: usize },
    /// A station finished swapping and announces the result
    SwapDone { station: usize },
}

impl EventKind {
    pub fn tag(&self) -> EventTag {
        match self {
            EventKind::Emit { .. } => EventTag::Emit,
            EventKind::LossDecision { .. } => EventTag::LossDecision,
            EventKind::Measure { .. } => EventTag::Measure,
            EventKind::SwapDone { .. } => EventTag::SwapDone,
        }
    }
}

/// Payload-free discriminant of [`EventKind`], used for counters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventTag {
    Emit = 0,
    LossDecision = 1,
    Measure = 2,
    SwapDone = 3,
}

impl EventTag {
    pub const COUNT: usize = 4;

    pub fn name(&self) -> &'static str {
        match self {
            EventTag::Emit => "emit",
            EventTag::LossDecision => "loss_decision",
            EventTag::Measure => "measure",
            EventTag::SwapDone => "swap_done",
        }
    }

    pub fn all() -> &'static [EventTag] {
        &[
            EventTag::Emit,
            EventTag::LossDecision,
            EventTag::Measure,
            EventTag::SwapDone,
        ]
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scheduled event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub time: SimTime,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: SimTime, kind: EventKind) -> Self {
        Event { time, kind }
    }
}
