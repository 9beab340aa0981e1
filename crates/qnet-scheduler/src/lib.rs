//! QNet Event Scheduler
//!
//! A cooperative, single-threaded dispatch loop. Events are ordered by
//! timestamp, ties broken by insertion order, and every handler runs to
//! completion before the next event is popped.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Scheduler                    │
//! │                                              │
//! │  BTreeMap<EventKey, Event>                   │
//! │  ordered by (time, sequence)                 │
//! │              │                               │
//! │              ▼                               │
//! │  EventHandler (one method per EventKind)     │
//! │              │                               │
//! │              ▼                               │
//! │  handler schedules follow-up events (≥ now)  │
//! └──────────────────────────────────────────────┘
//! ```

mod budget;
mod queue;
mod scheduler;

pub use budget::RunBudget;
pub use queue::EventKey;
pub use scheduler::{EventHandler, Flow, RunReport, Scheduler, SchedulerStats};
