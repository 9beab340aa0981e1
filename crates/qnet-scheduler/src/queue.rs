//! Event queue key with deterministic ordering.

use qnet_core::SimTime;

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Sequence number (FIFO for equal times)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    /// When this event should be dispatched.
    pub time: SimTime,
    /// Insertion sequence number.
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: SimTime, sequence: u64) -> Self {
        Self { time, sequence }
    }
}
