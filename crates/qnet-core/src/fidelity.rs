//! Fidelity bookkeeping
//!
//! QNet tracks only the fidelity-relevant projection of a quantum state.
//! An entangled link is a fidelity scalar plus a success flag; there is no
//! density-matrix propagation. This is a modelling approximation: protocol
//! logic only ever sees [`QuantumLinkState`], so a fuller backend can be
//! swapped in behind [`crate::QuantumBackend`] without touching protocols.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{QnetError, QnetResult};

/// Fidelity with respect to the target Bell state, always in [0, 1]
#[derive(Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Fidelity(f64);

impl Fidelity {
    pub const ZERO: Fidelity = Fidelity(0.0);
    pub const PERFECT: Fidelity = Fidelity(1.0);

    /// Create a fidelity, rejecting values outside [0, 1]
    pub fn new(value: f64) -> QnetResult<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Fidelity(value))
        } else {
            Err(QnetError::FidelityOutOfRange(value))
        }
    }

    /// Create a fidelity, clamping into [0, 1] (NaN maps to 0)
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Fidelity(0.0)
        } else {
            Fidelity(value.clamp(0.0, 1.0))
        }
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Scale by a factor, staying in range
    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        Self::saturating(self.0 * factor)
    }
}

impl TryFrom<f64> for Fidelity {
    type Error = QnetError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Fidelity::new(value)
    }
}

impl From<Fidelity> for f64 {
    fn from(f: Fidelity) -> f64 {
        f.0
    }
}

impl fmt::Debug for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F({:.6})", self.0)
    }
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Outcome of one entangled-pair attempt (elementary or swapped)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantumLinkState {
    /// Fidelity of the shared pair; meaningless when `success` is false
    pub fidelity: Fidelity,
    /// Whether a usable pair exists
    pub success: bool,
}

impl QuantumLinkState {
    /// A freshly prepared pair that has not travelled yet
    pub fn prepared(fidelity: Fidelity) -> Self {
        QuantumLinkState {
            fidelity,
            success: true,
        }
    }

    /// No usable pair (photon loss, failed measurement)
    pub fn lost() -> Self {
        QuantumLinkState {
            fidelity: Fidelity::ZERO,
            success: false,
        }
    }

    /// Fidelity if the link is usable
    pub fn usable_fidelity(&self) -> Option<Fidelity> {
        self.success.then_some(self.fidelity)
    }

    /// Apply an extra multiplicative degradation (decoherence, noise)
    pub fn degrade(self, factor: f64) -> Self {
        if self.success {
            QuantumLinkState {
                fidelity: self.fidelity.scale(factor),
                success: true,
            }
        } else {
            self
        }
    }
}

/// Swapped-link fidelity: product of inputs scaled by measurement fidelity.
///
/// `measurement_fidelity` is `1 - ε` for a Bell-state measurement error rate
/// `ε`; with an ideal measurement the output is the plain product. Failure
/// of either input yields a lost link.
pub fn combine(
    link_a: &QuantumLinkState,
    link_b: &QuantumLinkState,
    measurement_fidelity: f64,
) -> QuantumLinkState {
    if !(link_a.success && link_b.success) {
        return QuantumLinkState::lost();
    }
    let value = link_a.fidelity.value() * link_b.fidelity.value() * measurement_fidelity;
    QuantumLinkState {
        fidelity: Fidelity::saturating(value),
        success: true,
    }
}
