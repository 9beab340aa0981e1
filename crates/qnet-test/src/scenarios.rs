//! Reference experiments as ready-to-run scenarios

use qnet_channel::Channel;
use qnet_core::{Fidelity, FidelityBackend, QnetResult};
use qnet_protocol::{BellPairSource, ChainLayout, QuantumSwitch, RepeaterChain, ShotProtocol};
use qnet_scale::{BatchedNetworkBuilder, NetworkConfig, NetworkReport};
use qnet_scheduler::RunBudget;
use qnet_shots::{run_shots, ShotReport};

/// Window of the switch's moving success rate
pub const SWITCH_ROLLING_WINDOW: usize = 10;

/// A protocol plus how many shots to run it for
#[derive(Debug, Clone)]
pub struct Scenario<P> {
    pub name: &'static str,
    pub protocol: P,
    pub shots: u64,
    pub seed: u64,
    pub budget: RunBudget,
}

impl<P: ShotProtocol> Scenario<P> {
    pub fn new(name: &'static str, protocol: P) -> Self {
        Scenario {
            name,
            protocol,
            shots: 100,
            seed: 42,
            budget: RunBudget::unlimited(),
        }
    }

    pub fn with_shots(mut self, shots: u64) -> Self {
        self.shots = shots;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_budget(mut self, budget: RunBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn run(&self) -> QnetResult<ShotReport> {
        run_shots(&self.protocol, self.shots, self.seed, self.budget)
    }
}

/// Midpoint source with two telecom arms of `arm_length_km`
pub fn bell_pair(arm_length_km: f64) -> QnetResult<Scenario<BellPairSource>> {
    let arm = Channel::telecom(arm_length_km)?;
    let source = BellPairSource::new(&arm, &arm, FidelityBackend::ideal())?;
    Ok(Scenario::new("bell-pair", source).with_shots(200))
}

/// Two 50 km telecom links joined by one ideal swap
pub fn two_link_swap() -> QnetResult<Scenario<RepeaterChain>> {
    let config = NetworkConfig::two_link_swap();
    Ok(Scenario::new("two-link-swap", config.chain(config.node_count)?))
}

/// Two near-lossless links of fidelity `fidelity` joined by one ideal swap
pub fn ideal_two_link_swap(fidelity: f64) -> QnetResult<Scenario<RepeaterChain>> {
    let link = Channel::new(1e-9, 1e-9)?.with_pair_fidelity(Fidelity::new(fidelity)?);
    let layout = ChainLayout::uniform(3, link)?;
    Ok(Scenario::new("ideal-two-link-swap", RepeaterChain::new(layout, FidelityBackend::ideal())))
}

/// Two NV repeaters between the end nodes, 20 km links
pub fn nv_repeater_chain() -> QnetResult<Scenario<RepeaterChain>> {
    let config = NetworkConfig::nv_repeater_chain();
    Ok(Scenario::new("nv-repeater-chain", config.chain(config.node_count)?))
}

/// Switch with three clients on 20 km links, entangling clients 0 and 1
pub fn quantum_switch() -> QnetResult<Scenario<QuantumSwitch>> {
    let channel = Channel::telecom(20.0)?;
    let switch = QuantumSwitch::new(3, &channel, FidelityBackend::ideal())?.with_pair(0, 1)?;
    Ok(Scenario::new("quantum-switch", switch))
}

/// 1000-node chain with 10 km links, far above the default ceiling
pub fn large_chain() -> QnetResult<NetworkReport> {
    BatchedNetworkBuilder::new(NetworkConfig::large_chain())?.run()
}
