//! Aggregate statistics over shot results

use qnet_core::{ShotResult, SimTime};
use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.96;

/// Order-independent running sums over shot results.
///
/// Two accumulators over disjoint shot sets merge into the accumulator of
/// their union, whatever order the shots completed in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FidelityAccumulator {
    /// Shots that resolved (truncated shots excluded)
    pub completed: u64,
    pub successes: u64,
    pub truncated: u64,
    pub fidelity_sum: f64,
    pub fidelity_sum_sq: f64,
    /// Sum of elapsed time over completed shots, in nanoseconds
    pub elapsed_sum_ns: f64,
}

impl FidelityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &ShotResult) {
        if result.truncated {
            self.truncated += 1;
            return;
        }
        self.completed += 1;
        self.elapsed_sum_ns += result.elapsed_time.as_nanos();
        if let (true, Some(fidelity)) = (result.success, result.end_to_end_fidelity) {
            let f = fidelity.value();
            self.successes += 1;
            self.fidelity_sum += f;
            self.fidelity_sum_sq += f * f;
        }
    }

    pub fn merge(&mut self, other: &FidelityAccumulator) {
        self.completed += other.completed;
        self.successes += other.successes;
        self.truncated += other.truncated;
        self.fidelity_sum += other.fidelity_sum;
        self.fidelity_sum_sq += other.fidelity_sum_sq;
        self.elapsed_sum_ns += other.elapsed_sum_ns;
    }

    pub fn statistics(&self) -> AggregateStatistics {
        let k = self.successes as f64;
        let mean_fidelity = (self.successes > 0).then(|| self.fidelity_sum / k);
        let variance = match (self.successes >= 2, mean_fidelity) {
            (true, Some(mean)) => Some(((self.fidelity_sum_sq - k * mean * mean) / (k - 1.0)).max(0.0)),
            _ => None,
        };
        let confidence_interval = match (mean_fidelity, variance) {
            (Some(mean), Some(var)) => {
                let half_width = Z_95 * (var / k).sqrt();
                Some(((mean - half_width).max(0.0), (mean + half_width).min(1.0)))
            }
            _ => None,
        };
        let success_rate = if self.completed == 0 {
            0.0
        } else {
            self.successes as f64 / self.completed as f64
        };
        let mean_elapsed = if self.completed == 0 {
            SimTime::ZERO
        } else {
            SimTime::from_nanos(self.elapsed_sum_ns / self.completed as f64).unwrap_or(SimTime::ZERO)
        };

        AggregateStatistics {
            sample_count: self.completed,
            success_count: self.successes,
            truncated_count: self.truncated,
            success_rate,
            mean_fidelity,
            variance,
            confidence_interval,
            mean_elapsed,
        }
    }
}

impl<'a> FromIterator<&'a ShotResult> for FidelityAccumulator {
    fn from_iter<I: IntoIterator<Item = &'a ShotResult>>(iter: I) -> Self {
        let mut acc = FidelityAccumulator::new();
        for result in iter {
            acc.record(result);
        }
        acc
    }
}

/// Summary of a shot sequence. Derived data, recomputed on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    /// Resolved shots
    pub sample_count: u64,
    pub success_count: u64,
    /// Shots cut short by the run budget, excluded from every other figure
    pub truncated_count: u64,
    pub success_rate: f64,
    /// Mean fidelity over successful shots
    pub mean_fidelity: Option<f64>,
    /// Sample variance of the conditional fidelity
    pub variance: Option<f64>,
    /// 95% interval on the conditional mean fidelity
    pub confidence_interval: Option<(f64, f64)>,
    pub mean_elapsed: SimTime,
}

impl AggregateStatistics {
    pub fn from_results(results: &[ShotResult]) -> Self {
        results.iter().collect::<FidelityAccumulator>().statistics()
    }

    /// Standard error of the conditional mean fidelity
    pub fn standard_error(&self) -> Option<f64> {
        self.variance
            .map(|var| (var / self.success_count as f64).sqrt())
    }

    pub fn failure_count(&self) -> u64 {
        self.sample_count - self.success_count
    }
}
