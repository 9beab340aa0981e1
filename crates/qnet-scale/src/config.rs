//! Network configuration

use std::time::Duration;

use qnet_channel::{Channel, TELECOM_ATTENUATION_DB_PER_KM};
use qnet_core::{Confidence, Fidelity, FidelityBackend, QnetError, QnetResult, SimTime};
use qnet_protocol::{ChainLayout, RepeaterChain};
use qnet_scheduler::RunBudget;
use serde::{Deserialize, Serialize};

/// Elementary link parameters, shared by every link of a chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub length_km: f64,
    pub attenuation_db_per_km: f64,
    /// Fidelity of a freshly emitted pair
    pub pair_fidelity: f64,
    /// Memory/flight coherence time; `None` disables decay
    pub decoherence_time_ns: Option<f64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            length_km: 10.0,
            attenuation_db_per_km: TELECOM_ATTENUATION_DB_PER_KM,
            pair_fidelity: 0.98,
            decoherence_time_ns: None,
        }
    }
}

impl LinkConfig {
    pub fn new(length_km: f64, pair_fidelity: f64) -> Self {
        LinkConfig {
            length_km,
            pair_fidelity,
            ..Self::default()
        }
    }

    pub fn to_channel(&self) -> QnetResult<Channel> {
        let channel = Channel::new(self.length_km, self.attenuation_db_per_km)?
            .with_pair_fidelity(Fidelity::new(self.pair_fidelity)?);
        match self.decoherence_time_ns {
            Some(ns) => channel.with_decoherence_time(SimTime::from_nanos(ns)?),
            None => Ok(channel),
        }
    }
}

/// Bell-state measurement parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub measurement_fidelity: f64,
    pub bsm_success_probability: f64,
    pub measurement_duration_ns: f64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        SwapConfig {
            measurement_fidelity: 1.0,
            bsm_success_probability: 1.0,
            measurement_duration_ns: 0.0,
        }
    }
}

impl SwapConfig {
    pub fn backend(&self) -> QnetResult<FidelityBackend> {
        FidelityBackend::new(self.measurement_fidelity, self.bsm_success_probability)
    }

    pub fn measurement_duration(&self) -> QnetResult<SimTime> {
        SimTime::from_nanos(self.measurement_duration_ns)
    }
}

/// Resource limits
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_events_per_shot: Option<u64>,
    pub max_wall_clock_ms_per_shot: Option<u64>,
    /// Bound on resident topology memory
    pub max_memory_bytes: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig {
            max_events_per_shot: None,
            max_wall_clock_ms_per_shot: None,
            max_memory_bytes: 64 * 1024 * 1024,
        }
    }
}

impl BudgetConfig {
    pub fn run_budget(&self) -> RunBudget {
        RunBudget {
            max_events: self.max_events_per_shot,
            max_wall_clock: self.max_wall_clock_ms_per_shot.map(Duration::from_millis),
        }
    }
}

/// Everything needed to evaluate one network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub node_count: usize,
    pub link: LinkConfig,
    pub swap: SwapConfig,
    pub shots: u64,
    pub seed: u64,
    /// Largest node count simulated event by event
    pub simulation_ceiling: usize,
    /// Nodes per resident chain segment
    pub batch_width: usize,
    /// Node counts simulated to calibrate extrapolation
    pub calibration_node_counts: Vec<usize>,
    /// Allowed fidelity gap at the calibration boundary
    pub continuity_tolerance: f64,
    pub budget: BudgetConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            node_count: 10,
            link: LinkConfig::default(),
            swap: SwapConfig::default(),
            shots: 200,
            seed: 42,
            simulation_ceiling: 500,
            batch_width: 100,
            calibration_node_counts: vec![2, 4, 8, 16, 32],
            continuity_tolerance: 0.05,
            budget: BudgetConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Two 50 km links joined by one swap
    pub fn two_link_swap() -> Self {
        NetworkConfig {
            node_count: 3,
            link: LinkConfig::new(50.0, 1.0),
            ..Self::default()
        }
    }

    /// Two repeaters between the end nodes, 20 km links
    pub fn nv_repeater_chain() -> Self {
        NetworkConfig {
            node_count: 4,
            link: LinkConfig::new(20.0, 0.98),
            swap: SwapConfig {
                measurement_fidelity: 0.99,
                bsm_success_probability: 1.0,
                measurement_duration_ns: 10_000.0,
            },
            ..Self::default()
        }
    }

    /// 1000 nodes, 10 km links
    pub fn large_chain() -> Self {
        NetworkConfig {
            node_count: 1000,
            shots: 100,
            ..Self::default()
        }
    }

    pub fn with_node_count(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }

    pub fn with_swap(mut self, swap: SwapConfig) -> Self {
        self.swap = swap;
        self
    }

    pub fn with_shots(mut self, shots: u64) -> Self {
        self.shots = shots;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_simulation_ceiling(mut self, ceiling: usize) -> Self {
        self.simulation_ceiling = ceiling;
        self
    }

    pub fn with_batch_width(mut self, width: usize) -> Self {
        self.batch_width = width;
        self
    }

    pub fn with_calibration_node_counts(mut self, counts: Vec<usize>) -> Self {
        self.calibration_node_counts = counts;
        self
    }

    pub fn with_continuity_tolerance(mut self, tolerance: f64) -> Self {
        self.continuity_tolerance = tolerance;
        self
    }

    pub fn with_budget(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }

    /// Whether the configured size is simulated or extrapolated
    pub fn regime(&self) -> Confidence {
        if self.node_count <= self.simulation_ceiling {
            Confidence::Simulated
        } else {
            Confidence::Extrapolated
        }
    }

    /// Calibration node counts that can actually be simulated, ascending
    pub fn usable_calibration_counts(&self) -> Vec<usize> {
        let mut counts: Vec<usize> = self
            .calibration_node_counts
            .iter()
            .copied()
            .filter(|&n| n >= 2 && n <= self.simulation_ceiling)
            .collect();
        counts.sort_unstable();
        counts.dedup();
        counts
    }

    /// Check every parameter, reporting the first invalid one
    pub fn validate(&self) -> QnetResult<()> {
        fn invalid(msg: String) -> QnetResult<()> {
            Err(QnetError::InvalidConfiguration(msg))
        }

        if self.node_count < 2 {
            return invalid(format!("node_count must be at least 2, got {}", self.node_count));
        }
        if self.shots == 0 {
            return invalid("shots must be positive".into());
        }
        if self.simulation_ceiling < 2 {
            return invalid(format!(
                "simulation_ceiling must be at least 2, got {}",
                self.simulation_ceiling
            ));
        }
        if self.batch_width < 2 {
            return invalid(format!("batch_width must be at least 2, got {}", self.batch_width));
        }
        if !(self.continuity_tolerance.is_finite() && self.continuity_tolerance > 0.0) {
            return invalid(format!(
                "continuity_tolerance must be positive, got {}",
                self.continuity_tolerance
            ));
        }
        self.link.to_channel()?;
        self.swap.backend()?;
        self.swap.measurement_duration()?;
        if self.regime() == Confidence::Extrapolated && self.usable_calibration_counts().is_empty() {
            return invalid(format!(
                "no calibration node count between 2 and the ceiling {}",
                self.simulation_ceiling
            ));
        }
        Ok(())
    }

    /// Repeater chain of `node_count` nodes built from this configuration
    pub fn chain(&self, node_count: usize) -> QnetResult<RepeaterChain> {
        let layout = ChainLayout::uniform(node_count, self.link.to_channel()?)?;
        RepeaterChain::new(layout, self.swap.backend()?)
            .with_measurement_duration(self.swap.measurement_duration()?)
            .with_segment_width(self.batch_width)
    }
}
