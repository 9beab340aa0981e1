//! Quantum switch - a hub that entangles two chosen clients
//!
//! Each client shares one channel with the switch. Every channel attempts a
//! pair at time zero; once both selected links have arrived the switch
//! swaps them, producing a link between the two clients.

use qnet_channel::Channel;
use qnet_core::{
    EventKind, EventTag, FidelityBackend, NodeId, QnetError, QnetResult, QuantumBackend,
    QuantumLinkState, ShotId, ShotResult, ShotRng, SimTime,
};
use qnet_scheduler::{EventHandler, Flow, RunBudget, Scheduler};
use tracing::trace;

use crate::{EntanglementSwap, ShotProtocol, SwapFailure, SwapState, Topology};

/// Switch node serving `clients` end nodes
#[derive(Debug, Clone)]
pub struct QuantumSwitch<B = FidelityBackend> {
    topology: Topology,
    backend: B,
    /// Client indices (0-based) to entangle
    pair: (usize, usize),
    measurement_duration: SimTime,
    name: String,
}

impl<B: QuantumBackend> QuantumSwitch<B> {
    /// Switch with identical channels to every client, entangling clients 0 and 1
    pub fn new(clients: usize, channel: &Channel, backend: B) -> QnetResult<Self> {
        if clients < 2 {
            return Err(QnetError::InvalidConfiguration(format!(
                "a switch needs at least 2 clients, got {}",
                clients
            )));
        }
        Ok(Self {
            topology: Topology::star(clients, channel)?,
            backend,
            pair: (0, 1),
            measurement_duration: SimTime::ZERO,
            name: format!("quantum-switch/{}", clients),
        })
    }

    /// Choose which two clients to entangle
    pub fn with_pair(mut self, a: usize, b: usize) -> QnetResult<Self> {
        let clients = self.clients();
        if a == b || a >= clients || b >= clients {
            return Err(QnetError::InvalidConfiguration(format!(
                "client pair ({}, {}) invalid for {} clients",
                a, b, clients
            )));
        }
        self.pair = (a, b);
        Ok(self)
    }

    pub fn with_measurement_duration(mut self, duration: SimTime) -> Self {
        self.measurement_duration = duration;
        self
    }

    pub fn clients(&self) -> usize {
        self.topology.channels().len()
    }

    pub fn pair(&self) -> (usize, usize) {
        self.pair
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Node id of the switch itself
    pub fn switch_node(&self) -> NodeId {
        NodeId::ZERO
    }

    fn channel(&self, client: usize) -> QnetResult<&Channel> {
        self.topology
            .channel(client)
            .ok_or_else(|| QnetError::ProtocolStalled(format!("no channel to client {}", client)))
    }
}

impl<B: QuantumBackend> ShotProtocol for QuantumSwitch<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn hop_count(&self) -> u32 {
        2
    }

    fn run_shot(&self, shot: ShotId, rng: &mut ShotRng, budget: RunBudget) -> QnetResult<ShotResult> {
        let mut scheduler = Scheduler::new(budget);
        for client in 0..self.clients() {
            scheduler.schedule_at(SimTime::ZERO, EventKind::Emit { link: client })?;
        }
        let mut process = SwitchProcess {
            shot,
            switch: self,
            rng,
            links: vec![None; self.clients()],
            swap: EntanglementSwap::new(self.switch_node()),
            measurements: 0,
            early_failure: None,
        };
        let report = scheduler.run_until_empty(&mut process)?;
        let at = report.final_time;

        if report.truncated {
            return Ok(ShotResult::truncated(shot, 2, at, process.measurements));
        }
        if let Some(fidelity) = process.swap.outcome().and_then(|l| l.usable_fidelity()) {
            return Ok(ShotResult::succeeded(shot, fidelity, 2, at, process.measurements));
        }
        match process.failure() {
            Some(_) => Ok(ShotResult::failed(shot, 2, at, process.measurements)),
            None => Err(QnetError::ProtocolStalled(format!(
                "switch drained while {}",
                process.swap.state().name()
            ))),
        }
    }
}

struct SwitchProcess<'a, B> {
    shot: ShotId,
    switch: &'a QuantumSwitch<B>,
    rng: &'a mut ShotRng,
    links: Vec<Option<QuantumLinkState>>,
    swap: EntanglementSwap,
    measurements: u32,
    /// Failure decided before the swap could take both inputs
    early_failure: Option<SwapFailure>,
}

impl<B: QuantumBackend> SwitchProcess<'_, B> {
    /// Offer whichever selected links have arrived, in A-then-B order
    fn feed(&mut self, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let (a, b) = self.switch.pair;

        // A lost B link fails the swap even before A arrives
        if matches!(self.swap.state(), SwapState::AwaitingLinkA)
            && matches!(self.links[b], Some(link) if !link.success)
        {
            trace!(shot = %self.shot, client = b, "link B lost");
            self.early_failure = Some(SwapFailure::LinkBLost);
            return Ok(Flow::Halt);
        }

        if let (SwapState::AwaitingLinkA, Some(link)) = (self.swap.state(), self.links[a]) {
            self.swap.offer_link_a(link)?;
        }
        if let (SwapState::AwaitingLinkB { .. }, Some(link)) = (self.swap.state(), self.links[b]) {
            self.swap.offer_link_b(link)?;
            if matches!(self.swap.state(), SwapState::Measuring { .. }) {
                scheduler.schedule_after(SimTime::ZERO, EventKind::Measure { station: 0 })?;
            }
        }

        match self.swap.failure() {
            Some(reason) => {
                trace!(shot = %self.shot, ?reason, "switch swap failed");
                Ok(Flow::Halt)
            }
            None => Ok(Flow::Continue),
        }
    }

    fn failure(&self) -> Option<SwapFailure> {
        self.early_failure.or_else(|| self.swap.failure())
    }
}

impl<B: QuantumBackend> EventHandler for SwitchProcess<'_, B> {
    fn on_emit(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let delay = self.switch.channel(link)?.propagation_delay();
        scheduler.schedule_after(delay, EventKind::LossDecision { link })?;
        Ok(Flow::Continue)
    }

    fn on_loss_decision(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let switch = self.switch;
        let channel = switch.channel(link)?;
        let pair = switch.backend.prepare_pair(channel.pair_fidelity());
        self.links[link] = Some(channel.transmit(pair, self.rng));

        let (a, b) = switch.pair;
        if self.failure().is_some() || self.swap.state().is_terminal() || (link != a && link != b) {
            return Ok(Flow::Continue);
        }
        self.feed(scheduler)
    }

    fn on_measure(&mut self, station: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        self.swap.measure(&self.switch.backend, self.rng)?;
        self.measurements += 1;
        scheduler.schedule_after(self.switch.measurement_duration, EventKind::SwapDone { station })?;
        Ok(Flow::Continue)
    }

    fn on_swap_done(&mut self, _station: usize, _scheduler: &mut Scheduler) -> QnetResult<Flow> {
        if !self.swap.state().is_terminal() {
            return Err(QnetError::UnexpectedEvent {
                kind: EventTag::SwapDone,
                protocol: "quantum switch",
            });
        }
        Ok(Flow::Continue)
    }
}
