//! Deterministic dispatch loop.
//!
//! Given the same handler and the same seeded randomness inside it, the
//! scheduler dispatches the identical event sequence every run.

use std::collections::BTreeMap;
use std::time::Instant;

use qnet_core::{Event, EventKind, EventTag, QnetError, QnetResult, SimTime};
use tracing::{debug, trace};

use crate::{EventKey, RunBudget};

/// Whether the run continues after a handler returns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop now and discard every pending event
    Halt,
}

/// Fixed handler table: one method per [`EventKind`].
///
/// Handlers may schedule follow-up events on the scheduler they are given;
/// scheduling before the current time fails with `OrderingViolation`.
pub trait EventHandler {
    fn on_emit(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow>;

    fn on_loss_decision(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow>;

    fn on_measure(&mut self, station: usize, scheduler: &mut Scheduler) -> QnetResult<Flow>;

    fn on_swap_done(&mut self, station: usize, scheduler: &mut Scheduler) -> QnetResult<Flow>;
}

/// Summary of one `run_until_empty` call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunReport {
    /// Events dispatched during this call
    pub events_dispatched: u64,
    /// Time of the last dispatched event
    pub final_time: SimTime,
    /// The budget ran out with events still pending
    pub truncated: bool,
    /// A handler asked to stop
    pub halted: bool,
    /// Events left in the queue
    pub pending: usize,
}

/// Statistics collected over the scheduler's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub events_scheduled: u64,
    pub events_dispatched: u64,
    /// Dispatched events per kind, indexed by [`EventTag::index`]
    pub events_by_kind: [u64; EventTag::COUNT],
    /// Events dropped by `Halt` or `clear`
    pub events_discarded: u64,
}

impl SchedulerStats {
    pub fn dispatched(&self, tag: EventTag) -> u64 {
        self.events_by_kind[tag.index()]
    }
}

/// Discrete-event scheduler
pub struct Scheduler {
    /// Pending events, ordered deterministically.
    queue: BTreeMap<EventKey, Event>,
    /// Sequence counter for FIFO tie-breaking.
    sequence: u64,
    /// Current simulation time.
    now: SimTime,
    /// Timestamp of the previously dispatched event.
    last_dispatched: Option<SimTime>,
    budget: RunBudget,
    /// Set by the first run, for the wall-clock budget.
    started: Option<Instant>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Create a scheduler at time zero
    pub fn new(budget: RunBudget) -> Self {
        Self::starting_at(SimTime::ZERO, budget)
    }

    /// Create a scheduler whose clock starts at `start`
    pub fn starting_at(start: SimTime, budget: RunBudget) -> Self {
        Scheduler {
            queue: BTreeMap::new(),
            sequence: 0,
            now: start,
            last_dispatched: None,
            budget,
            started: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Current simulation time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of pending events
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn budget(&self) -> &RunBudget {
        &self.budget
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Insert an event. Scheduling before the current time is a fatal error.
    pub fn schedule(&mut self, event: Event) -> QnetResult<()> {
        if event.time < self.now {
            return Err(QnetError::OrderingViolation {
                now: self.now,
                requested: event.time,
            });
        }
        let key = EventKey::new(event.time, self.sequence);
        self.sequence += 1;
        self.stats.events_scheduled += 1;
        self.queue.insert(key, event);
        Ok(())
    }

    /// Schedule `kind` at an absolute time
    pub fn schedule_at(&mut self, time: SimTime, kind: EventKind) -> QnetResult<()> {
        self.schedule(Event::new(time, kind))
    }

    /// Schedule `kind` after a delay from now
    pub fn schedule_after(&mut self, delay: SimTime, kind: EventKind) -> QnetResult<()> {
        self.schedule(Event::new(self.now + delay, kind))
    }

    /// Drop every pending event, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.stats.events_discarded += dropped as u64;
        dropped
    }

    /// Dispatch events in order until the queue drains, a handler halts,
    /// or the budget runs out.
    pub fn run_until_empty<H>(&mut self, handler: &mut H) -> QnetResult<RunReport>
    where
        H: EventHandler + ?Sized,
    {
        let started = *self.started.get_or_insert_with(Instant::now);
        let mut dispatched = 0u64;
        let mut halted = false;
        let mut truncated = false;

        while !self.queue.is_empty() {
            if self.budget.events_exhausted(self.stats.events_dispatched)
                || self.budget.wall_clock_exhausted(started.elapsed())
            {
                truncated = true;
                debug!(
                    now = %self.now,
                    pending = self.queue.len(),
                    dispatched = self.stats.events_dispatched,
                    "Run budget exhausted, truncating"
                );
                break;
            }

            let Some((_, event)) = self.queue.pop_first() else {
                break;
            };
            debug_assert!(self.last_dispatched.map_or(true, |t| event.time >= t));
            self.now = event.time;
            self.last_dispatched = Some(event.time);
            self.stats.events_dispatched += 1;
            self.stats.events_by_kind[event.kind.tag().index()] += 1;
            dispatched += 1;

            trace!(time = %event.time, kind = ?event.kind, "dispatch");

            let flow = match event.kind {
                EventKind::Emit { link } => handler.on_emit(link, self)?,
                EventKind::LossDecision { link } => handler.on_loss_decision(link, self)?,
                EventKind::Measure { station } => handler.on_measure(station, self)?,
                EventKind::SwapDone { station } => handler.on_swap_done(station, self)?,
            };

            if flow == Flow::Halt {
                halted = true;
                self.clear();
                break;
            }
        }

        Ok(RunReport {
            events_dispatched: dispatched,
            final_time: self.now,
            truncated,
            halted,
            pending: self.queue.len(),
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(RunBudget::unlimited())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn t(nanos: f64) -> SimTime {
        SimTime::from_nanos(nanos).unwrap()
    }

    /// Records dispatch order; optionally chains follow-up events.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(SimTime, EventKind)>,
        follow_up_delay: Option<SimTime>,
        halt_on_measure: bool,
        schedule_into_past: bool,
    }

    impl Recorder {
        fn record(&mut self, kind: EventKind, scheduler: &mut Scheduler) {
            self.seen.push((scheduler.now(), kind));
        }
    }

    impl EventHandler for Recorder {
        fn on_emit(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
            self.record(EventKind::Emit { link }, scheduler);
            if let Some(delay) = self.follow_up_delay {
                scheduler.schedule_after(delay, EventKind::LossDecision { link })?;
            }
            Ok(Flow::Continue)
        }

        fn on_loss_decision(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
            self.record(EventKind::LossDecision { link }, scheduler);
            if self.schedule_into_past {
                scheduler.schedule_at(SimTime::ZERO, EventKind::Measure { station: 0 })?;
            }
            Ok(Flow::Continue)
        }

        fn on_measure(&mut self, station: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
            self.record(EventKind::Measure { station }, scheduler);
            if self.halt_on_measure {
                Ok(Flow::Halt)
            } else {
                Ok(Flow::Continue)
            }
        }

        fn on_swap_done(&mut self, station: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
            self.record(EventKind::SwapDone { station }, scheduler);
            Ok(Flow::Continue)
        }
    }

    #[test]
    fn test_dispatches_in_time_order() {
        let mut sched = Scheduler::default();
        sched.schedule_at(t(30.0), EventKind::Emit { link: 3 }).unwrap();
        sched.schedule_at(t(10.0), EventKind::Emit { link: 1 }).unwrap();
        sched.schedule_at(t(20.0), EventKind::Emit { link: 2 }).unwrap();

        let mut rec = Recorder::default();
        let report = sched.run_until_empty(&mut rec).unwrap();

        let links: Vec<_> = rec.seen.iter().map(|(_, k)| *k).collect();
        assert_eq!(
            links,
            vec![
                EventKind::Emit { link: 1 },
                EventKind::Emit { link: 2 },
                EventKind::Emit { link: 3 },
            ]
        );
        assert_eq!(report.events_dispatched, 3);
        assert_eq!(report.final_time, t(30.0));
        assert!(!report.truncated && !report.halted);
    }

    #[test]
    fn test_equal_times_are_fifo() {
        let mut sched = Scheduler::default();
        for link in 0..5 {
            sched.schedule_at(t(7.0), EventKind::Emit { link }).unwrap();
        }
        let mut rec = Recorder::default();
        sched.run_until_empty(&mut rec).unwrap();
        let order: Vec<_> = rec
            .seen
            .iter()
            .map(|(_, k)| match k {
                EventKind::Emit { link } => *link,
                _ => usize::MAX,
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_handlers_schedule_follow_ups() {
        let mut sched = Scheduler::default();
        sched.schedule_at(t(0.0), EventKind::Emit { link: 0 }).unwrap();
        let mut rec = Recorder {
            follow_up_delay: Some(t(50.0)),
            ..Default::default()
        };
        sched.run_until_empty(&mut rec).unwrap();
        assert_eq!(rec.seen.len(), 2);
        assert_eq!(rec.seen[1], (t(50.0), EventKind::LossDecision { link: 0 }));
        assert_eq!(sched.stats().dispatched(EventTag::LossDecision), 1);
    }

    #[test]
    fn test_scheduling_into_past_is_ordering_violation() {
        let mut sched = Scheduler::default();
        sched.schedule_at(t(100.0), EventKind::LossDecision { link: 0 }).unwrap();
        let mut rec = Recorder {
            schedule_into_past: true,
            ..Default::default()
        };
        let err = sched.run_until_empty(&mut rec).unwrap_err();
        assert_eq!(
            err,
            QnetError::OrderingViolation {
                now: t(100.0),
                requested: SimTime::ZERO,
            }
        );
    }

    #[test]
    fn test_schedule_before_start_time_rejected() {
        let mut sched = Scheduler::starting_at(t(10.0), RunBudget::unlimited());
        assert!(sched.schedule_at(t(5.0), EventKind::Emit { link: 0 }).is_err());
        assert!(sched.schedule_at(t(10.0), EventKind::Emit { link: 0 }).is_ok());
    }

    #[test]
    fn test_halt_discards_pending() {
        let mut sched = Scheduler::default();
        sched.schedule_at(t(1.0), EventKind::Measure { station: 0 }).unwrap();
        sched.schedule_at(t(2.0), EventKind::SwapDone { station: 0 }).unwrap();
        sched.schedule_at(t(3.0), EventKind::SwapDone { station: 1 }).unwrap();
        let mut rec = Recorder {
            halt_on_measure: true,
            ..Default::default()
        };
        let report = sched.run_until_empty(&mut rec).unwrap();
        assert!(report.halted);
        assert_eq!(report.pending, 0);
        assert_eq!(sched.stats().events_discarded, 2);
        assert_eq!(rec.seen.len(), 1);
    }

    #[test]
    fn test_event_budget_truncates() {
        let mut sched = Scheduler::new(RunBudget::unlimited().with_max_events(2));
        for link in 0..5 {
            sched.schedule_at(t(link as f64), EventKind::Emit { link }).unwrap();
        }
        let mut rec = Recorder::default();
        let report = sched.run_until_empty(&mut rec).unwrap();
        assert!(report.truncated);
        assert_eq!(report.events_dispatched, 2);
        assert_eq!(report.pending, 3);

        // The budget is cumulative: a second run dispatches nothing
        let again = sched.run_until_empty(&mut rec).unwrap();
        assert!(again.truncated);
        assert_eq!(again.events_dispatched, 0);
    }

    #[test]
    fn test_wall_clock_budget_truncates() {
        let mut sched = Scheduler::new(RunBudget::unlimited().with_max_wall_clock(Duration::ZERO));
        for link in 0..3 {
            sched.schedule_at(t(link as f64), EventKind::Emit { link }).unwrap();
        }
        let mut rec = Recorder::default();
        let report = sched.run_until_empty(&mut rec).unwrap();
        assert!(report.truncated);
        assert_eq!(report.events_dispatched, 0);
        assert_eq!(report.pending, 3);
        assert!(rec.seen.is_empty());
    }

    #[test]
    fn test_empty_queue_is_not_truncated() {
        let mut sched = Scheduler::new(RunBudget::unlimited().with_max_events(0));
        let report = sched.run_until_empty(&mut Recorder::default()).unwrap();
        assert!(!report.truncated);
        assert_eq!(report.events_dispatched, 0);
    }

    proptest! {
        #[test]
        fn prop_dispatch_is_monotonic_and_fifo(times in proptest::collection::vec(0u32..50, 1..200)) {
            let mut sched = Scheduler::default();
            for (i, nanos) in times.iter().enumerate() {
                sched.schedule_at(t(*nanos as f64), EventKind::Emit { link: i }).unwrap();
            }
            let mut rec = Recorder::default();
            sched.run_until_empty(&mut rec).unwrap();
            prop_assert_eq!(rec.seen.len(), times.len());

            for pair in rec.seen.windows(2) {
                let (t0, k0) = pair[0];
                let (t1, k1) = pair[1];
                prop_assert!(t1 >= t0);
                if t1 == t0 {
                    if let (EventKind::Emit { link: a }, EventKind::Emit { link: b }) = (k0, k1) {
                        prop_assert!(a < b);
                    }
                }
            }
        }
    }
}
