//! Quantum-primitive capability
//!
//! Protocols never manipulate quantum states directly. Pair preparation and
//! Bell-state measurement go through [`QuantumBackend`], which returns
//! success/fidelity outcomes. [`FidelityBackend`] is the fidelity-only
//! implementation used throughout QNet.

use serde::{Deserialize, Serialize};

use rand::Rng;

use crate::{check_probability, combine, Fidelity, QnetError, QnetResult, QuantumLinkState, ShotRng};

/// Gate-level capability the protocols rely on
pub trait QuantumBackend {
    /// Prepare a Bell pair with the given source fidelity
    fn prepare_pair(&self, fidelity: Fidelity) -> QuantumLinkState {
        QuantumLinkState::prepared(fidelity)
    }

    /// Bell-state measurement on the local halves of two links.
    ///
    /// Returns the link spanning the two far ends, or a lost link if the
    /// measurement did not herald success.
    fn bell_state_measurement(
        &self,
        link_a: &QuantumLinkState,
        link_b: &QuantumLinkState,
        rng: &mut ShotRng,
    ) -> QuantumLinkState;
}

/// Fidelity-only backend
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BackendParameters")]
pub struct FidelityBackend {
    /// 1 - Bell-basis measurement error rate
    measurement_fidelity: f64,
    /// Probability that a measurement heralds success
    success_probability: f64,
}

impl FidelityBackend {
    pub fn new(measurement_fidelity: f64, success_probability: f64) -> QnetResult<Self> {
        if !(0.0..=1.0).contains(&measurement_fidelity) {
            return Err(QnetError::FidelityOutOfRange(measurement_fidelity));
        }
        check_probability(success_probability)?;
        Ok(FidelityBackend {
            measurement_fidelity,
            success_probability,
        })
    }

    /// Perfect, deterministic measurement
    pub fn ideal() -> Self {
        FidelityBackend {
            measurement_fidelity: 1.0,
            success_probability: 1.0,
        }
    }

    /// Linear-optics Bell measurement (distinguishes half the Bell states)
    pub fn linear_optics() -> Self {
        FidelityBackend {
            measurement_fidelity: 1.0,
            success_probability: 0.5,
        }
    }

    pub fn measurement_fidelity(&self) -> f64 {
        self.measurement_fidelity
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }
}

/// Unchecked wire form, validated through [`FidelityBackend::new`]
#[derive(Deserialize)]
struct BackendParameters {
    measurement_fidelity: f64,
    success_probability: f64,
}

impl TryFrom<BackendParameters> for FidelityBackend {
    type Error = QnetError;

    fn try_from(raw: BackendParameters) -> Result<Self, Self::Error> {
        FidelityBackend::new(raw.measurement_fidelity, raw.success_probability)
    }
}

impl Default for FidelityBackend {
    fn default() -> Self {
        Self::ideal()
    }
}

impl QuantumBackend for FidelityBackend {
    fn bell_state_measurement(
        &self,
        link_a: &QuantumLinkState,
        link_b: &QuantumLinkState,
        rng: &mut ShotRng,
    ) -> QuantumLinkState {
        // Deterministic measurements draw nothing from the stream
        if self.success_probability < 1.0 && rng.gen::<f64>() >= self.success_probability {
            return QuantumLinkState::lost();
        }
        combine(link_a, link_b, self.measurement_fidelity)
    }
}
