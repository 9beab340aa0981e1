//! Distance sweep of the Bell-pair experiment
//!
//! For each fibre length a midpoint source sends one half of a pair down
//! each of two arms of that length. The measured success rate is reported
//! next to the analytic expectation `p(L)^2`.

use qnet_channel::Channel;
use qnet_core::{Fidelity, FidelityBackend, QnetError, QnetResult};
use qnet_protocol::BellPairSource;
use qnet_scheduler::RunBudget;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{run_shots, AggregateStatistics};

/// Parameters of a sweep
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceSweep {
    /// Arm lengths to evaluate, in km
    pub lengths_km: Vec<f64>,
    pub attenuation_db_per_km: f64,
    pub pair_fidelity: f64,
    pub shots_per_point: u64,
    pub master_seed: u64,
    pub budget: RunBudget,
}

impl DistanceSweep {
    /// `points` evenly spaced lengths in `(0, max_length_km]`
    pub fn evenly_spaced(max_length_km: f64, points: usize) -> QnetResult<Self> {
        if points == 0 || !(max_length_km.is_finite() && max_length_km > 0.0) {
            return Err(QnetError::InvalidConfiguration(format!(
                "cannot space {} points up to {} km",
                points, max_length_km
            )));
        }
        let step = max_length_km / points as f64;
        Ok(Self {
            lengths_km: (1..=points).map(|i| step * i as f64).collect(),
            ..Self::default()
        })
    }

    pub fn with_shots(mut self, shots: u64) -> Self {
        self.shots_per_point = shots;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.master_seed = seed;
        self
    }

    pub fn with_attenuation(mut self, attenuation_db_per_km: f64) -> Self {
        self.attenuation_db_per_km = attenuation_db_per_km;
        self
    }

    /// Run every point. All points share the master seed.
    pub fn run(&self) -> QnetResult<Vec<SweepPoint>> {
        let pair_fidelity = Fidelity::new(self.pair_fidelity)?;
        self.lengths_km
            .iter()
            .map(|&length_km| {
                let arm = Channel::new(length_km, self.attenuation_db_per_km)?;
                let source = BellPairSource::new(&arm, &arm, FidelityBackend::ideal())?
                    .with_pair_fidelity(pair_fidelity);
                let report = run_shots(&source, self.shots_per_point, self.master_seed, self.budget)?;
                let expected_success = source.expected_success_probability();
                debug!(
                    length_km,
                    measured = report.statistics.success_rate,
                    expected = expected_success,
                    "Sweep point"
                );
                Ok(SweepPoint {
                    length_km,
                    transmission_probability: arm.transmission_probability(),
                    expected_success,
                    statistics: report.statistics,
                })
            })
            .collect()
    }
}

impl Default for DistanceSweep {
    /// 0.2 dB/km telecom fibre, 10 to 100 km, 200 shots per point
    fn default() -> Self {
        Self {
            lengths_km: (1..=10).map(|i| 10.0 * i as f64).collect(),
            attenuation_db_per_km: qnet_channel::TELECOM_ATTENUATION_DB_PER_KM,
            pair_fidelity: 1.0,
            shots_per_point: 200,
            master_seed: 0,
            budget: RunBudget::unlimited(),
        }
    }
}

/// One evaluated length
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub length_km: f64,
    /// Per-arm transmission probability
    pub transmission_probability: f64,
    /// Both arms must deliver
    pub expected_success: f64,
    pub statistics: AggregateStatistics,
}

impl SweepPoint {
    pub fn deviation(&self) -> f64 {
        (self.statistics.success_rate - self.expected_success).abs()
    }
}
