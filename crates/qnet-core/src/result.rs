//! Per-shot results and provenance

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Fidelity, ShotId, SimTime};

/// Where a reported number came from.
///
/// Every output handed to reporting carries this tag so simulated and
/// extrapolated figures are never mixed up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Produced by event-level simulation
    Simulated,
    /// Produced by the closed-form scaling model
    Extrapolated,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Simulated => f.write_str("simulated"),
            Confidence::Extrapolated => f.write_str("extrapolated"),
        }
    }
}

/// Outcome of one independent trial. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShotResult {
    pub shot: ShotId,
    /// End-to-end fidelity, `None` when the shot failed
    pub end_to_end_fidelity: Option<Fidelity>,
    pub success: bool,
    /// Elementary links spanned by the attempt
    pub hop_count: u32,
    /// Simulation time at which the outcome was known
    pub elapsed_time: SimTime,
    /// Bell-state measurements actually performed
    pub measurements: u32,
    /// The run budget ran out before the shot resolved
    pub truncated: bool,
}

impl ShotResult {
    pub fn succeeded(
        shot: ShotId,
        fidelity: Fidelity,
        hop_count: u32,
        elapsed_time: SimTime,
        measurements: u32,
    ) -> Self {
        ShotResult {
            shot,
            end_to_end_fidelity: Some(fidelity),
            success: true,
            hop_count,
            elapsed_time,
            measurements,
            truncated: false,
        }
    }

    pub fn failed(shot: ShotId, hop_count: u32, elapsed_time: SimTime, measurements: u32) -> Self {
        ShotResult {
            shot,
            end_to_end_fidelity: None,
            success: false,
            hop_count,
            elapsed_time,
            measurements,
            truncated: false,
        }
    }

    pub fn truncated(shot: ShotId, hop_count: u32, elapsed_time: SimTime, measurements: u32) -> Self {
        ShotResult {
            truncated: true,
            ..Self::failed(shot, hop_count, elapsed_time, measurements)
        }
    }
}
