//! Repeater chain - left-to-right folding of swaps
//!
//! Every link of the chain is attempted at time zero. Once the accumulated
//! link (initially link 0) and the next elementary link are both ready, the
//! node between them runs an entanglement swap; its result becomes the new
//! accumulated link. The shot succeeds when the last link has been folded in
//! and fails at the first lost link or failed measurement.
//!
//! Long chains can be run in segments of a fixed width. Consecutive segments
//! share their boundary node and the accumulated link of one segment enters
//! the next as its first input, so only one segment is resident at a time.

use std::time::Instant;

use qnet_channel::Channel;
use qnet_core::{
    EventKind, EventTag, FidelityBackend, QnetError, QnetResult, QuantumBackend,
    QuantumLinkState, ShotId, ShotResult, ShotRng, SimTime,
};
use qnet_scheduler::{EventHandler, Flow, RunBudget, Scheduler};
use tracing::trace;

use crate::{ChainLayout, ChainSegment, EntanglementSwap, ShotProtocol};

/// Linear chain of repeaters joined by entanglement swapping
#[derive(Debug, Clone)]
pub struct RepeaterChain<B = FidelityBackend> {
    layout: ChainLayout,
    backend: B,
    /// Time between a Bell-state measurement and its result being known
    measurement_duration: SimTime,
    /// Nodes per resident segment
    segment_width: usize,
    name: String,
}

impl<B: QuantumBackend> RepeaterChain<B> {
    /// Chain run as a single segment with instantaneous measurements
    pub fn new(layout: ChainLayout, backend: B) -> Self {
        let name = format!("repeater-chain/{}", layout.node_count());
        let segment_width = layout.node_count();
        Self {
            layout,
            backend,
            measurement_duration: SimTime::ZERO,
            segment_width,
            name,
        }
    }

    pub fn with_measurement_duration(mut self, duration: SimTime) -> Self {
        self.measurement_duration = duration;
        self
    }

    /// Run the chain in segments of at most `width` nodes
    pub fn with_segment_width(mut self, width: usize) -> QnetResult<Self> {
        // Validates the width
        self.layout.segments(width)?;
        self.segment_width = width;
        Ok(self)
    }

    pub fn layout(&self) -> &ChainLayout {
        &self.layout
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn measurement_duration(&self) -> SimTime {
        self.measurement_duration
    }

    pub fn segment_width(&self) -> usize {
        self.segment_width
    }

    /// Run one shot of the chain
    pub fn run(&self, shot: ShotId, rng: &mut ShotRng, budget: RunBudget) -> QnetResult<ShotResult> {
        let hops = self.layout.link_count() as u32;
        let started = Instant::now();
        let mut events_used = 0u64;
        let mut measurements = 0u32;
        let mut carry: Option<Carry> = None;

        for segment in self.layout.segments(self.segment_width)? {
            let mut scheduler = Scheduler::new(budget.remaining(events_used, started.elapsed()));
            let mut process = SegmentProcess::new(
                shot,
                &segment,
                &self.backend,
                &mut *rng,
                carry.take(),
                self.measurement_duration,
            );
            process.start(&mut scheduler)?;
            let report = scheduler.run_until_empty(&mut process)?;
            events_used += report.events_dispatched;
            measurements += process.measurements;

            if report.truncated {
                trace!(shot = %shot, at = %report.final_time, "shot truncated");
                return Ok(ShotResult::truncated(shot, hops, report.final_time, measurements));
            }

            match process.outcome {
                Some(SegmentOutcome::Established(link)) => carry = Some(link),
                Some(SegmentOutcome::Failed { at }) => {
                    return Ok(ShotResult::failed(shot, hops, at, measurements));
                }
                None => {
                    return Err(QnetError::ProtocolStalled(format!(
                        "segment starting at node {} drained without an outcome",
                        segment.first_position
                    )));
                }
            }
        }

        match carry {
            Some(Carry { link, at }) => match link.usable_fidelity() {
                Some(fidelity) => Ok(ShotResult::succeeded(shot, fidelity, hops, at, measurements)),
                None => Ok(ShotResult::failed(shot, hops, at, measurements)),
            },
            None => Err(QnetError::ProtocolStalled("chain produced no segments".into())),
        }
    }
}

impl<B: QuantumBackend> ShotProtocol for RepeaterChain<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn hop_count(&self) -> u32 {
        self.layout.link_count() as u32
    }

    fn run_shot(&self, shot: ShotId, rng: &mut ShotRng, budget: RunBudget) -> QnetResult<ShotResult> {
        self.run(shot, rng, budget)
    }
}

/// Accumulated link handed from one segment to the next
#[derive(Debug, Clone, Copy)]
struct Carry {
    link: QuantumLinkState,
    at: SimTime,
}

#[derive(Debug, Clone, Copy)]
enum SegmentOutcome {
    Established(Carry),
    Failed { at: SimTime },
}

/// Event handler for one resident segment.
///
/// Input `k` is either the carried link (`k == 0` when a carry exists) or
/// the segment's local channel `k - offset`.
struct SegmentProcess<'a, B> {
    shot: ShotId,
    segment: &'a ChainSegment,
    backend: &'a B,
    rng: &'a mut ShotRng,
    carry: Option<Carry>,
    offset: usize,
    measurement_duration: SimTime,
    inputs: Vec<Option<QuantumLinkState>>,
    accumulated: Option<QuantumLinkState>,
    /// Next input to fold into the accumulated link
    next_input: usize,
    swap: Option<EntanglementSwap>,
    measurements: u32,
    outcome: Option<SegmentOutcome>,
}

impl<'a, B: QuantumBackend> SegmentProcess<'a, B> {
    fn new(
        shot: ShotId,
        segment: &'a ChainSegment,
        backend: &'a B,
        rng: &'a mut ShotRng,
        carry: Option<Carry>,
        measurement_duration: SimTime,
    ) -> Self {
        let offset = usize::from(carry.is_some());
        Self {
            shot,
            segment,
            backend,
            rng,
            carry,
            offset,
            measurement_duration,
            inputs: vec![None; segment.link_count() + offset],
            accumulated: None,
            next_input: 1,
            swap: None,
            measurements: 0,
            outcome: None,
        }
    }

    fn start(&self, scheduler: &mut Scheduler) -> QnetResult<()> {
        for input in self.offset..self.inputs.len() {
            scheduler.schedule_at(SimTime::ZERO, EventKind::Emit { link: input })?;
        }
        if let Some(carry) = self.carry {
            scheduler.schedule_at(carry.at, EventKind::LossDecision { link: 0 })?;
        }
        Ok(())
    }

    fn channel(&self, input: usize) -> QnetResult<&'a Channel> {
        let segment: &'a ChainSegment = self.segment;
        input
            .checked_sub(self.offset)
            .and_then(|local| segment.channels.get(local))
            .ok_or_else(|| QnetError::ProtocolStalled(format!("no channel for input {}", input)))
    }

    fn fail(&mut self, scheduler: &Scheduler) -> Flow {
        self.outcome = Some(SegmentOutcome::Failed { at: scheduler.now() });
        Flow::Halt
    }

    /// Start the next swap if its inputs are ready, or finish the segment
    fn advance(&mut self, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        if self.swap.is_some() {
            return Ok(Flow::Continue);
        }
        let accumulated = match (self.accumulated, self.inputs[0]) {
            (Some(link), _) => link,
            (None, Some(link)) => {
                self.accumulated = Some(link);
                link
            }
            (None, None) => return Ok(Flow::Continue),
        };

        if self.next_input == self.inputs.len() {
            self.outcome = Some(SegmentOutcome::Established(Carry {
                link: accumulated,
                at: scheduler.now(),
            }));
            return Ok(Flow::Continue);
        }

        let Some(link_b) = self.inputs[self.next_input] else {
            return Ok(Flow::Continue);
        };
        let station = self.next_input - self.offset;
        let station_id = self
            .segment
            .node_id(station)
            .ok_or_else(|| QnetError::ProtocolStalled(format!("no node at local position {}", station)))?;

        let mut swap = EntanglementSwap::new(station_id);
        swap.offer_link_a(accumulated)?;
        swap.offer_link_b(link_b)?;
        if let Some(reason) = swap.failure() {
            trace!(shot = %self.shot, station = %station_id, ?reason, "swap failed before measurement");
            return Ok(self.fail(scheduler));
        }
        self.swap = Some(swap);
        scheduler.schedule_after(SimTime::ZERO, EventKind::Measure { station })?;
        Ok(Flow::Continue)
    }
}

impl<B: QuantumBackend> EventHandler for SegmentProcess<'_, B> {
    fn on_emit(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let delay = self.channel(link)?.propagation_delay();
        scheduler.schedule_after(delay, EventKind::LossDecision { link })?;
        Ok(Flow::Continue)
    }

    fn on_loss_decision(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let state = match self.carry {
            Some(carry) if link == 0 => carry.link,
            _ => {
                let channel = self.channel(link)?;
                let pair = self.backend.prepare_pair(channel.pair_fidelity());
                channel.transmit(pair, self.rng)
            }
        };
        if !state.success {
            trace!(
                shot = %self.shot,
                link = self.segment.global_link(link.saturating_sub(self.offset)),
                "elementary link lost"
            );
            return Ok(self.fail(scheduler));
        }
        self.inputs[link] = Some(state);
        self.advance(scheduler)
    }

    fn on_measure(&mut self, station: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let swap = self.swap.as_mut().ok_or(QnetError::UnexpectedEvent {
            kind: EventTag::Measure,
            protocol: "repeater chain",
        })?;
        swap.measure(self.backend, self.rng)?;
        self.measurements += 1;
        scheduler.schedule_after(self.measurement_duration, EventKind::SwapDone { station })?;
        Ok(Flow::Continue)
    }

    fn on_swap_done(&mut self, _station: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let swap = self.swap.take().ok_or(QnetError::UnexpectedEvent {
            kind: EventTag::SwapDone,
            protocol: "repeater chain",
        })?;
        match swap.outcome() {
            Some(link) => {
                self.accumulated = Some(link);
                self.next_input += 1;
                self.advance(scheduler)
            }
            None => {
                trace!(shot = %self.shot, station = %swap.station(), "Bell-state measurement failed");
                Ok(self.fail(scheduler))
            }
        }
    }
}
