//! Batched network builder
//!
//! Chains are materialised one segment of `batch_width` nodes at a time.
//! Up to the simulation ceiling every shot walks the segments through the
//! event scheduler; above it only the calibration chains are simulated and
//! the requested size is handed to the analytical model, so resident memory
//! never depends on the requested node count.

use qnet_core::{Confidence, QnetError, QnetResult};
use qnet_protocol::segment_footprint_estimate;
use qnet_shots::{run_shots, ShotReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    AnalyticalExtrapolator, CalibrationPoint, ContinuityCheck, ExtrapolationParameters,
    NetworkConfig, ScaleSummary,
};

/// Outcome of evaluating one configured network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub confidence: Confidence,
    pub node_count: usize,
    pub summary: ScaleSummary,
    /// Per-shot results, simulated regime only
    pub shots: Option<ShotReport>,
    /// Fitted model, extrapolated regime only
    pub parameters: Option<ExtrapolationParameters>,
    /// Boundary comparison, absent when calibration saw no success
    pub continuity: Option<ContinuityCheck>,
    /// Most chain nodes materialised at once
    pub peak_resident_nodes: usize,
    pub estimated_peak_memory_bytes: usize,
}

/// Builds and evaluates a chain network, choosing the regime from the ceiling
#[derive(Clone, Debug)]
pub struct BatchedNetworkBuilder {
    config: NetworkConfig,
}

impl BatchedNetworkBuilder {
    /// Validate `config` and check the resident segment fits the memory budget
    pub fn new(config: NetworkConfig) -> QnetResult<Self> {
        config.validate()?;
        let builder = Self { config };
        let required = builder.estimated_peak_memory_bytes();
        let budget = builder.config.budget.max_memory_bytes;
        if required > budget {
            return Err(QnetError::MemoryBudgetExceeded { required, budget });
        }
        Ok(builder)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn regime(&self) -> Confidence {
        self.config.regime()
    }

    /// Largest chain this builder will simulate
    fn largest_simulated(&self) -> usize {
        match self.regime() {
            Confidence::Simulated => self.config.node_count,
            Confidence::Extrapolated => self
                .config
                .usable_calibration_counts()
                .last()
                .copied()
                .unwrap_or(2),
        }
    }

    /// Nodes resident at once
    pub fn peak_resident_nodes(&self) -> usize {
        self.config.batch_width.min(self.largest_simulated())
    }

    pub fn estimated_peak_memory_bytes(&self) -> usize {
        segment_footprint_estimate(self.peak_resident_nodes())
    }

    /// Simulate the configured chain, or calibrate and extrapolate
    pub fn run(&self) -> QnetResult<NetworkReport> {
        match self.regime() {
            Confidence::Simulated => self.run_simulated(),
            Confidence::Extrapolated => self.run_extrapolated(),
        }
    }

    fn run_simulated(&self) -> QnetResult<NetworkReport> {
        let config = &self.config;
        debug!(
            nodes = config.node_count,
            batch_width = config.batch_width,
            shots = config.shots,
            "Simulating chain"
        );
        let chain = config.chain(config.node_count)?;
        let report = run_shots(&chain, config.shots, config.seed, config.budget.run_budget())?;
        let summary = ScaleSummary::from_simulation(config, &report)?;

        Ok(NetworkReport {
            confidence: Confidence::Simulated,
            node_count: config.node_count,
            summary,
            shots: Some(report),
            parameters: None,
            continuity: None,
            peak_resident_nodes: self.peak_resident_nodes(),
            estimated_peak_memory_bytes: self.estimated_peak_memory_bytes(),
        })
    }

    fn run_extrapolated(&self) -> QnetResult<NetworkReport> {
        let config = &self.config;
        info!(
            nodes = config.node_count,
            ceiling = config.simulation_ceiling,
            "Node count above simulation ceiling, switching to extrapolation"
        );
        let points = self.calibration_points()?;
        let parameters = ExtrapolationParameters::calibrate(&points, &config.link, &config.swap)?;
        let continuity = parameters.check_continuity(config.continuity_tolerance)?;
        let summary = AnalyticalExtrapolator::new(parameters.clone()).extrapolate(config.node_count)?;

        Ok(NetworkReport {
            confidence: Confidence::Extrapolated,
            node_count: config.node_count,
            summary,
            shots: None,
            parameters: Some(parameters),
            continuity,
            peak_resident_nodes: self.peak_resident_nodes(),
            estimated_peak_memory_bytes: self.estimated_peak_memory_bytes(),
        })
    }

    /// Simulate every usable calibration node count
    pub fn calibration_points(&self) -> QnetResult<Vec<CalibrationPoint>> {
        let config = &self.config;
        config
            .usable_calibration_counts()
            .into_iter()
            .map(|node_count| {
                let chain = config.chain(node_count)?;
                let report = run_shots(&chain, config.shots, config.seed, config.budget.run_budget())?;
                debug!(
                    node_count,
                    success_rate = report.statistics.success_rate,
                    mean_fidelity = ?report.statistics.mean_fidelity,
                    "Calibration point"
                );
                Ok(CalibrationPoint {
                    node_count,
                    statistics: report.statistics,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BudgetConfig, LinkConfig};

    fn short_links() -> LinkConfig {
        // 1 km links keep calibration chains mostly successful
        LinkConfig::new(1.0, 0.98)
    }

    #[test]
    fn test_small_chain_is_simulated() {
        let config = NetworkConfig::default()
            .with_node_count(12)
            .with_link(short_links())
            .with_batch_width(5)
            .with_shots(100);
        let report = BatchedNetworkBuilder::new(config).unwrap().run().unwrap();
        assert_eq!(report.confidence, Confidence::Simulated);
        assert_eq!(report.summary.confidence, Confidence::Simulated);
        assert_eq!(report.peak_resident_nodes, 5);
        let shots = report.shots.unwrap();
        assert_eq!(shots.shots.len(), 100);
        assert!(report.parameters.is_none());
        // Ideal swaps: every success has fidelity exactly F0^(n-1)
        let expected = 0.98f64.powi(11);
        for f in shots.successful_fidelities() {
            assert!((f - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_above_ceiling_is_extrapolated() {
        let config = NetworkConfig::large_chain()
            .with_link(short_links())
            .with_simulation_ceiling(40)
            .with_calibration_node_counts(vec![2, 4, 8, 16])
            .with_shots(100);
        let builder = BatchedNetworkBuilder::new(config).unwrap();
        let report = builder.run().unwrap();

        assert_eq!(report.confidence, Confidence::Extrapolated);
        assert_eq!(report.summary.confidence, Confidence::Extrapolated);
        assert!(report.shots.is_none());
        assert_eq!(report.node_count, 1000);
        assert_eq!(report.peak_resident_nodes, 16);
        assert!(report.estimated_peak_memory_bytes <= builder.config().budget.max_memory_bytes);

        let continuity = report.continuity.unwrap();
        assert!(continuity.holds);
        let f = report.summary.mean_fidelity.unwrap();
        assert!((f - 0.98f64.powi(999)).abs() < 1e-9);
    }

    #[test]
    fn test_lossy_calibration_still_extrapolates() {
        // 150 km links: no calibration shot ever succeeds
        let config = NetworkConfig::large_chain()
            .with_link(LinkConfig::new(150.0, 0.98))
            .with_simulation_ceiling(40)
            .with_calibration_node_counts(vec![2, 4])
            .with_shots(50);
        let report = BatchedNetworkBuilder::new(config).unwrap().run().unwrap();

        assert_eq!(report.confidence, Confidence::Extrapolated);
        assert!(report.continuity.is_none());
        let parameters = report.parameters.unwrap();
        assert!(!parameters.is_calibrated());
        assert!((report.summary.mean_fidelity.unwrap() - 0.98f64.powi(999)).abs() < 1e-12);
        assert_eq!(report.summary.success_probability, 0.0);
    }

    #[test]
    fn test_truncated_calibration_still_extrapolates() {
        let config = NetworkConfig::large_chain()
            .with_link(short_links())
            .with_simulation_ceiling(40)
            .with_calibration_node_counts(vec![4, 8])
            .with_shots(20)
            .with_budget(BudgetConfig {
                max_events_per_shot: Some(1),
                ..BudgetConfig::default()
            });
        let builder = BatchedNetworkBuilder::new(config).unwrap();
        for point in builder.calibration_points().unwrap() {
            assert_eq!(point.statistics.truncated_count, 20);
        }
        let report = builder.run().unwrap();
        assert_eq!(report.confidence, Confidence::Extrapolated);
        assert!(!report.parameters.unwrap().is_calibrated());
    }

    #[test]
    fn test_memory_does_not_grow_with_extrapolated_size() {
        let base = NetworkConfig::large_chain().with_simulation_ceiling(40);
        let small = BatchedNetworkBuilder::new(base.clone().with_node_count(1_000)).unwrap();
        let huge = BatchedNetworkBuilder::new(base.with_node_count(10_000_000)).unwrap();
        assert_eq!(small.estimated_peak_memory_bytes(), huge.estimated_peak_memory_bytes());
    }

    #[test]
    fn test_memory_budget_checked_up_front() {
        let config = NetworkConfig::default().with_budget(BudgetConfig {
            max_memory_bytes: 16,
            ..BudgetConfig::default()
        });
        let err = BatchedNetworkBuilder::new(config).unwrap_err();
        assert!(matches!(err, QnetError::MemoryBudgetExceeded { budget: 16, .. }));
    }
}
