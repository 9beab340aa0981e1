//! Analytical extrapolation beyond the simulation ceiling
//!
//! End-to-end fidelity follows `F(n) = A · F0^(n-1)` for a chain of `n`
//! nodes. `F0` comes from a log-linear least-squares fit over simulated
//! calibration points; the prefactor `A` is then pinned so the model passes
//! through the largest calibrated point, which keeps the handoff between
//! simulated and extrapolated figures continuous.
//!
//! When no calibration point produced a successful shot there is nothing to
//! fit. The model then falls back to the closed-form link factor
//! `F0 = F_pair · decay · η` with `A = 1/η`, and is reported as unanchored.
//!
//! Success probability and timing use closed forms of the link parameters:
//! `p_link^(n-1) · p_bsm^(n-2)` and `d + (n-2) · t_meas`.

use qnet_channel::{propagation_delay, transmission_probability};
use qnet_core::{Confidence, QnetError, QnetResult, SimTime};
use qnet_shots::{AggregateStatistics, ShotReport};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{LinkConfig, NetworkConfig, SwapConfig};

/// Simulated statistics at one node count
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub node_count: usize,
    pub statistics: AggregateStatistics,
}

/// Largest calibrated point, the one the model is pinned to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPoint {
    pub node_count: usize,
    pub fidelity: f64,
    pub success_rate: f64,
}

/// Fitted scaling model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolationParameters {
    /// Per-link fidelity factor F0
    pub base_fidelity: f64,
    /// Prefactor A
    pub prefactor: f64,
    pub link_length_km: f64,
    pub attenuation_db_per_km: f64,
    pub bsm_success_probability: f64,
    pub measurement_duration_ns: f64,
    /// Smallest and largest node counts used in the fit
    pub calibration_range: Option<(usize, usize)>,
    /// `None` when no calibration point had a successful shot
    pub boundary: Option<BoundaryPoint>,
}

impl ExtrapolationParameters {
    /// Fit the model from simulated calibration points.
    ///
    /// Points without a successful shot carry no fidelity information and
    /// are skipped. If none remain the closed-form link factor is used.
    pub fn calibrate(
        points: &[CalibrationPoint],
        link: &LinkConfig,
        swap: &SwapConfig,
    ) -> QnetResult<Self> {
        let mut usable: Vec<(usize, f64, f64)> = points
            .iter()
            .filter(|p| p.node_count >= 2)
            .filter_map(|p| {
                p.statistics
                    .mean_fidelity
                    .filter(|&f| f > 0.0)
                    .map(|f| (p.node_count, f, p.statistics.success_rate))
            })
            .collect();
        usable.sort_by_key(|&(n, _, _)| n);

        let (Some(&first), Some(&boundary)) = (usable.first(), usable.last()) else {
            return Self::closed_form(points.len(), link, swap);
        };

        // ln F = ln A + (n - 1) ln F0
        let xs: Vec<f64> = usable.iter().map(|&(n, _, _)| (n - 1) as f64).collect();
        let ys: Vec<f64> = usable.iter().map(|&(_, f, _)| f.ln()).collect();
        let slope = fit_slope(&xs, &ys).unwrap_or_else(|| ys[ys.len() - 1] / xs[xs.len() - 1]);
        let base_fidelity = slope.exp().clamp(f64::MIN_POSITIVE, 1.0);

        let (boundary_n, boundary_f, boundary_rate) = boundary;
        let prefactor = boundary_f / base_fidelity.powi(boundary_n as i32 - 1);

        let parameters = ExtrapolationParameters {
            base_fidelity,
            prefactor,
            link_length_km: link.length_km,
            attenuation_db_per_km: link.attenuation_db_per_km,
            bsm_success_probability: swap.bsm_success_probability,
            measurement_duration_ns: swap.measurement_duration_ns,
            calibration_range: Some((first.0, boundary_n)),
            boundary: Some(BoundaryPoint {
                node_count: boundary_n,
                fidelity: boundary_f,
                success_rate: boundary_rate,
            }),
        };
        info!(
            f0 = parameters.base_fidelity,
            prefactor = parameters.prefactor,
            points = usable.len(),
            boundary = boundary_n,
            "Calibrated extrapolation model"
        );
        Ok(parameters)
    }

    /// Unanchored model built from the link and swap parameters alone
    fn closed_form(point_count: usize, link: &LinkConfig, swap: &SwapConfig) -> QnetResult<Self> {
        let channel = link.to_channel()?;
        let eta = swap.measurement_fidelity;
        let base_fidelity = channel.pair_fidelity().value() * channel.decay_factor() * eta;
        // n-1 links but only n-2 measurements
        let prefactor = if eta > 0.0 { 1.0 / eta } else { 1.0 };
        warn!(
            points = point_count,
            f0 = base_fidelity,
            "No calibration point had a successful shot, using closed-form link model"
        );
        Ok(ExtrapolationParameters {
            base_fidelity,
            prefactor,
            link_length_km: link.length_km,
            attenuation_db_per_km: link.attenuation_db_per_km,
            bsm_success_probability: swap.bsm_success_probability,
            measurement_duration_ns: swap.measurement_duration_ns,
            calibration_range: None,
            boundary: None,
        })
    }

    /// Whether the model is pinned to a simulated point
    pub fn is_calibrated(&self) -> bool {
        self.boundary.is_some()
    }

    /// Modelled conditional fidelity at `node_count` nodes
    pub fn fidelity_at(&self, node_count: usize) -> f64 {
        let links = node_count.saturating_sub(1) as f64;
        (self.prefactor * self.base_fidelity.powf(links)).clamp(0.0, 1.0)
    }

    pub fn transmission_per_link(&self) -> QnetResult<f64> {
        transmission_probability(self.link_length_km, self.attenuation_db_per_km)
    }

    /// `p_link^(n-1) · p_bsm^(n-2)`
    pub fn success_probability_at(&self, node_count: usize) -> QnetResult<f64> {
        let links = node_count.saturating_sub(1) as f64;
        let swaps = node_count.saturating_sub(2) as f64;
        Ok(self.transmission_per_link()?.powf(links) * self.bsm_success_probability.powf(swaps))
    }

    /// Compare the model against the simulated boundary point.
    ///
    /// `None` for an unanchored model, which has no boundary to compare.
    pub fn check_continuity(&self, tolerance: f64) -> QnetResult<Option<ContinuityCheck>> {
        let Some(boundary) = &self.boundary else {
            return Ok(None);
        };
        let n = boundary.node_count;
        let extrapolated_fidelity = self.fidelity_at(n);
        let extrapolated_success_rate = self.success_probability_at(n)?;
        let fidelity_deviation = (extrapolated_fidelity - boundary.fidelity).abs();
        let success_deviation = (extrapolated_success_rate - boundary.success_rate).abs();
        let holds = fidelity_deviation <= tolerance;

        if !holds {
            warn!(
                node_count = n,
                simulated = boundary.fidelity,
                extrapolated = extrapolated_fidelity,
                tolerance,
                "Fidelity discontinuity at calibration boundary"
            );
        }
        if success_deviation > tolerance {
            warn!(
                node_count = n,
                simulated = boundary.success_rate,
                extrapolated = extrapolated_success_rate,
                "Success rate at calibration boundary departs from closed form"
            );
        }

        Ok(Some(ContinuityCheck {
            node_count: n,
            simulated_fidelity: boundary.fidelity,
            extrapolated_fidelity,
            fidelity_deviation,
            simulated_success_rate: boundary.success_rate,
            extrapolated_success_rate,
            success_deviation,
            tolerance,
            holds,
        }))
    }
}

/// Least-squares slope of `ys` against `xs`; `None` without spread in `xs`
fn fit_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    Some(sxy / sxx)
}

/// Model against simulation at the boundary node count
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContinuityCheck {
    pub node_count: usize,
    pub simulated_fidelity: f64,
    pub extrapolated_fidelity: f64,
    pub fidelity_deviation: f64,
    pub simulated_success_rate: f64,
    pub extrapolated_success_rate: f64,
    pub success_deviation: f64,
    pub tolerance: f64,
    /// Fidelity agrees within tolerance
    pub holds: bool,
}

/// Per-network figures, simulated or extrapolated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleSummary {
    pub confidence: Confidence,
    pub node_count: usize,
    pub hop_count: u32,
    /// Conditional end-to-end fidelity
    pub mean_fidelity: Option<f64>,
    pub success_probability: f64,
    /// Time until a successful attempt resolves
    pub elapsed_on_success: Option<SimTime>,
    pub total_distance_km: f64,
    pub transmission_per_link: f64,
    pub attenuation_per_link_db: f64,
    pub propagation_delay_per_link: SimTime,
    /// `(n-1) · L / c`
    pub end_to_end_propagation_delay: SimTime,
    /// Nested purification rounds, `ceil(log2 n)`
    pub purification_rounds: u32,
}

impl ScaleSummary {
    /// Summary of a simulated chain run
    pub fn from_simulation(config: &NetworkConfig, report: &ShotReport) -> QnetResult<Self> {
        let successes: Vec<f64> = report
            .shots
            .iter()
            .filter(|s| s.success)
            .map(|s| s.elapsed_time.as_nanos())
            .collect();
        let elapsed_on_success = if successes.is_empty() {
            None
        } else {
            Some(SimTime::from_nanos(successes.iter().sum::<f64>() / successes.len() as f64)?)
        };
        Ok(ScaleSummary {
            confidence: Confidence::Simulated,
            mean_fidelity: report.statistics.mean_fidelity,
            success_probability: report.statistics.success_rate,
            elapsed_on_success,
            ..Self::link_figures(config.node_count, &config.link)?
        })
    }

    /// Geometry and per-link figures, identical in both regimes
    fn link_figures(node_count: usize, link: &LinkConfig) -> QnetResult<Self> {
        let links = node_count.saturating_sub(1);
        let per_link = propagation_delay(link.length_km)?;
        Ok(ScaleSummary {
            confidence: Confidence::Extrapolated,
            node_count,
            hop_count: links as u32,
            mean_fidelity: None,
            success_probability: 0.0,
            elapsed_on_success: None,
            total_distance_km: links as f64 * link.length_km,
            transmission_per_link: transmission_probability(link.length_km, link.attenuation_db_per_km)?,
            attenuation_per_link_db: link.attenuation_db_per_km * link.length_km,
            propagation_delay_per_link: per_link,
            end_to_end_propagation_delay: SimTime::from_nanos(per_link.as_nanos() * links as f64)?,
            purification_rounds: purification_rounds(node_count),
        })
    }
}

/// `ceil(log2 n)` for `n >= 1`
pub fn purification_rounds(node_count: usize) -> u32 {
    match node_count {
        0 | 1 => 0,
        n => usize::BITS - (n - 1).leading_zeros(),
    }
}

/// Closed-form evaluator. Holds only the fitted parameters, so its memory
/// does not depend on the node counts it is asked about.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticalExtrapolator {
    parameters: ExtrapolationParameters,
}

impl AnalyticalExtrapolator {
    pub fn new(parameters: ExtrapolationParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &ExtrapolationParameters {
        &self.parameters
    }

    /// Evaluate the model at `node_count`, without running any event
    pub fn extrapolate(&self, node_count: usize) -> QnetResult<ScaleSummary> {
        if node_count < 2 {
            return Err(QnetError::InvalidConfiguration(format!(
                "cannot extrapolate to {} nodes",
                node_count
            )));
        }
        let p = &self.parameters;
        let link = LinkConfig {
            length_km: p.link_length_km,
            attenuation_db_per_km: p.attenuation_db_per_km,
            ..LinkConfig::default()
        };
        let figures = ScaleSummary::link_figures(node_count, &link)?;
        let swaps = node_count.saturating_sub(2) as f64;
        let elapsed = figures.propagation_delay_per_link.as_nanos() + swaps * p.measurement_duration_ns;

        Ok(ScaleSummary {
            confidence: Confidence::Extrapolated,
            mean_fidelity: Some(p.fidelity_at(node_count)),
            success_probability: p.success_probability_at(node_count)?,
            elapsed_on_success: Some(SimTime::from_nanos(elapsed)?),
            ..figures
        })
    }
}
