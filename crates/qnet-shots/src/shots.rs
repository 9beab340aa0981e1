//! Shot runner

use qnet_core::{Confidence, QnetError, QnetResult, RngStreams, ShotId, ShotResult};
use qnet_protocol::ShotProtocol;
use qnet_scheduler::RunBudget;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AggregateStatistics, FidelityAccumulator};

/// Every shot of one run plus the statistics derived from them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShotReport {
    pub protocol: String,
    pub confidence: Confidence,
    pub master_seed: u64,
    pub hop_count: u32,
    pub shots: Vec<ShotResult>,
    pub statistics: AggregateStatistics,
}

impl ShotReport {
    /// Some shot ran out of budget; the report is partial
    pub fn is_truncated(&self) -> bool {
        self.statistics.truncated_count > 0
    }

    /// Recompute the running sums from the stored shots
    pub fn accumulator(&self) -> FidelityAccumulator {
        self.shots.iter().collect()
    }

    /// Fidelities of successful shots, in shot order
    pub fn successful_fidelities(&self) -> impl Iterator<Item = f64> + '_ {
        self.shots
            .iter()
            .filter(|s| s.success)
            .filter_map(|s| s.end_to_end_fidelity)
            .map(|f| f.value())
    }

    /// Moving average of per-shot success over `window` resolved shots.
    ///
    /// One value per full window; empty when `window` is zero or exceeds the
    /// number of resolved shots.
    pub fn rolling_success_rate(&self, window: usize) -> Vec<f64> {
        let outcomes: Vec<f64> = self
            .shots
            .iter()
            .filter(|s| !s.truncated)
            .map(|s| if s.success { 1.0 } else { 0.0 })
            .collect();
        if window == 0 || window > outcomes.len() {
            return Vec::new();
        }
        outcomes
            .windows(window)
            .map(|w| w.iter().sum::<f64>() / window as f64)
            .collect()
    }
}

/// Run `num_shots` independent shots of `protocol`.
///
/// Shot `i` draws from stream `i` of `master_seed`, so a fixed seed always
/// yields the same report.
pub fn run_shots<P>(
    protocol: &P,
    num_shots: u64,
    master_seed: u64,
    budget: RunBudget,
) -> QnetResult<ShotReport>
where
    P: ShotProtocol + ?Sized,
{
    if num_shots == 0 {
        return Err(QnetError::InvalidConfiguration(
            "shot count must be positive".into(),
        ));
    }

    let streams = RngStreams::new(master_seed);
    let mut acc = FidelityAccumulator::new();
    let mut shots = Vec::with_capacity(num_shots as usize);

    for index in 0..num_shots {
        let shot = ShotId::new(index);
        let mut rng = streams.stream(shot);
        let result = protocol.run_shot(shot, &mut rng, budget)?;
        acc.record(&result);
        shots.push(result);
    }

    let statistics = acc.statistics();
    debug!(
        protocol = protocol.name(),
        shots = num_shots,
        success_rate = statistics.success_rate,
        mean_fidelity = ?statistics.mean_fidelity,
        truncated = statistics.truncated_count,
        "Shot run complete"
    );

    Ok(ShotReport {
        protocol: protocol.name().to_string(),
        confidence: Confidence::Simulated,
        master_seed,
        hop_count: protocol.hop_count(),
        shots,
        statistics,
    })
}
