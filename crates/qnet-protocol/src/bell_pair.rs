//! Midpoint Bell-pair source
//!
//! A source between two nodes emits an entangled pair and sends one half to
//! each side. The pair is shared only if both halves arrive.

use qnet_channel::Channel;
use qnet_core::{
    EventKind, EventTag, Fidelity, FidelityBackend, QnetError, QnetResult, QuantumBackend,
    QuantumLinkState, ShotId, ShotResult, ShotRng, SimTime,
};
use qnet_scheduler::{EventHandler, Flow, RunBudget, Scheduler};
use tracing::trace;

use crate::{ShotProtocol, Topology};

/// Entangled-pair source sharing a pair between nodes A and B
#[derive(Debug, Clone)]
pub struct BellPairSource<B = FidelityBackend> {
    topology: Topology,
    backend: B,
    pair_fidelity: Fidelity,
    name: String,
}

impl<B: QuantumBackend> BellPairSource<B> {
    pub fn new(towards_a: &Channel, towards_b: &Channel, backend: B) -> QnetResult<Self> {
        Ok(Self {
            topology: Topology::midpoint_source(towards_a, towards_b)?,
            backend,
            pair_fidelity: Fidelity::PERFECT,
            name: format!(
                "bell-pair/{}+{}km",
                towards_a.length_km(),
                towards_b.length_km()
            ),
        })
    }

    /// Source in the middle of a fibre of `total_length_km`
    pub fn symmetric(total_length_km: f64, attenuation_db_per_km: f64, backend: B) -> QnetResult<Self> {
        let half = Channel::new(total_length_km / 2.0, attenuation_db_per_km)?;
        Self::new(&half, &half, backend)
    }

    pub fn with_pair_fidelity(mut self, fidelity: Fidelity) -> Self {
        self.pair_fidelity = fidelity;
        self
    }

    pub fn pair_fidelity(&self) -> Fidelity {
        self.pair_fidelity
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Probability that both halves arrive
    pub fn expected_success_probability(&self) -> f64 {
        self.topology
            .channels()
            .iter()
            .map(Channel::transmission_probability)
            .product()
    }

    fn channel(&self, half: usize) -> QnetResult<&Channel> {
        self.topology
            .channel(half)
            .ok_or_else(|| QnetError::ProtocolStalled(format!("no channel for half {}", half)))
    }
}

impl<B: QuantumBackend> ShotProtocol for BellPairSource<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn hop_count(&self) -> u32 {
        1
    }

    fn run_shot(&self, shot: ShotId, rng: &mut ShotRng, budget: RunBudget) -> QnetResult<ShotResult> {
        let mut scheduler = Scheduler::new(budget);
        scheduler.schedule_at(SimTime::ZERO, EventKind::Emit { link: 0 })?;
        scheduler.schedule_at(SimTime::ZERO, EventKind::Emit { link: 1 })?;

        let mut process = PairProcess {
            shot,
            source: self,
            rng,
            halves: [None; 2],
            lost: false,
        };
        let report = scheduler.run_until_empty(&mut process)?;
        let at = report.final_time;

        if report.truncated {
            return Ok(ShotResult::truncated(shot, 1, at, 0));
        }
        match process.halves {
            [Some(a), Some(b)] if !process.lost => {
                let fidelity = self.pair_fidelity.scale(a.fidelity.value() * b.fidelity.value());
                Ok(ShotResult::succeeded(shot, fidelity, 1, at, 0))
            }
            _ => Ok(ShotResult::failed(shot, 1, at, 0)),
        }
    }
}

struct PairProcess<'a, B> {
    shot: ShotId,
    source: &'a BellPairSource<B>,
    rng: &'a mut ShotRng,
    /// Arrived halves, each carrying its own flight decay
    halves: [Option<QuantumLinkState>; 2],
    lost: bool,
}

impl<B: QuantumBackend> EventHandler for PairProcess<'_, B> {
    fn on_emit(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let delay = self.source.channel(link)?.propagation_delay();
        scheduler.schedule_after(delay, EventKind::LossDecision { link })?;
        Ok(Flow::Continue)
    }

    fn on_loss_decision(&mut self, link: usize, _scheduler: &mut Scheduler) -> QnetResult<Flow> {
        let source = self.source;
        let channel = source.channel(link)?;
        let half = channel.transmit(source.backend.prepare_pair(Fidelity::PERFECT), self.rng);
        if !half.success {
            trace!(shot = %self.shot, half = link, "photon lost");
            self.lost = true;
            return Ok(Flow::Halt);
        }
        self.halves[link] = Some(half);
        Ok(Flow::Continue)
    }

    fn on_measure(&mut self, _station: usize, _scheduler: &mut Scheduler) -> QnetResult<Flow> {
        Err(QnetError::UnexpectedEvent {
            kind: EventTag::Measure,
            protocol: "bell pair source",
        })
    }

    fn on_swap_done(&mut self, _station: usize, _scheduler: &mut Scheduler) -> QnetResult<Flow> {
        Err(QnetError::UnexpectedEvent {
            kind: EventTag::SwapDone,
            protocol: "bell pair source",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_core::RngStreams;

    fn run(source: &BellPairSource, seed: u64, shot: u64) -> ShotResult {
        let streams = RngStreams::new(seed);
        let id = ShotId::new(shot);
        source
            .run_shot(id, &mut streams.stream(id), RunBudget::unlimited())
            .unwrap()
    }

    #[test]
    fn test_short_fibre_shares_pair() {
        let source = BellPairSource::symmetric(2e-9, 1e-9, FidelityBackend::ideal())
            .unwrap()
            .with_pair_fidelity(Fidelity::new(0.99).unwrap());
        let result = run(&source, 0, 0);
        assert!(result.success);
        assert_eq!(result.hop_count, 1);
        assert_eq!(result.measurements, 0);
        assert!((result.end_to_end_fidelity.unwrap().value() - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_success_needs_both_halves() {
        // 50 km total: each half travels 25 km, p = 10^-0.5 per half
        let source = BellPairSource::symmetric(50.0, 0.2, FidelityBackend::ideal()).unwrap();
        let expected = source.expected_success_probability();
        assert!((expected - 0.1).abs() < 1e-12);

        let shots = 4000;
        let successes = (0..shots).filter(|&s| run(&source, 21, s).success).count();
        let rate = successes as f64 / shots as f64;
        println!("bell pair success rate {:.4}, expected {:.4}", rate, expected);
        assert!((rate - expected).abs() < 0.03);
    }

    #[test]
    fn test_decoherence_in_flight_lowers_fidelity() {
        let half = Channel::new(1e-9, 1e-9)
            .unwrap()
            .with_decoherence_time(SimTime::from_nanos(1e-6).unwrap())
            .unwrap();
        let source = BellPairSource::new(&half, &half, FidelityBackend::ideal()).unwrap();
        let result = run(&source, 0, 0);
        let expected = half.decay_factor() * half.decay_factor();
        assert!(result.success);
        assert!(expected < 1.0);
        assert!((result.end_to_end_fidelity.unwrap().value() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_elapsed_is_arrival_time() {
        let a = Channel::telecom(10.0).unwrap();
        let b = Channel::telecom(30.0).unwrap();
        let source = BellPairSource::new(&a, &b, FidelityBackend::ideal()).unwrap();
        for shot in 0..40 {
            let result = run(&source, 2, shot);
            if result.success {
                assert_eq!(result.elapsed_time, b.propagation_delay());
            }
        }
    }
}
