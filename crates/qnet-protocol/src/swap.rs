//! Entanglement swap - Bell-state measurement at a station
//!
//! ```text
//! AwaitingLinkA ──ok──▶ AwaitingLinkB ──ok──▶ Measuring ──▶ Success
//!       │                     │                   │
//!       └──lost──▶ Failure ◀──┴──lost             └──no herald──▶ Failure
//! ```
//!
//! A lost input fails the swap immediately; no measurement is spent on it.

use qnet_core::{NodeId, QnetError, QnetResult, QuantumBackend, QuantumLinkState, ShotRng};
use serde::Serialize;

/// Why a swap produced no link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapFailure {
    LinkALost,
    LinkBLost,
    /// The Bell-state measurement did not herald success
    MeasurementFailed,
}

/// State of one swap attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SwapState {
    AwaitingLinkA,
    AwaitingLinkB { link_a: QuantumLinkState },
    Measuring {
        link_a: QuantumLinkState,
        link_b: QuantumLinkState,
    },
    Success(QuantumLinkState),
    Failure(SwapFailure),
}

impl SwapState {
    pub fn name(&self) -> &'static str {
        match self {
            SwapState::AwaitingLinkA => "awaiting link A",
            SwapState::AwaitingLinkB { .. } => "awaiting link B",
            SwapState::Measuring { .. } => "measuring",
            SwapState::Success(_) => "succeeded",
            SwapState::Failure(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapState::Success(_) | SwapState::Failure(_))
    }
}

/// One swap attempt at a station, consuming two links into one
#[derive(Debug, Clone, Serialize)]
pub struct EntanglementSwap {
    station: NodeId,
    state: SwapState,
}

impl EntanglementSwap {
    pub fn new(station: NodeId) -> Self {
        Self {
            station,
            state: SwapState::AwaitingLinkA,
        }
    }

    pub fn station(&self) -> NodeId {
        self.station
    }

    pub fn state(&self) -> &SwapState {
        &self.state
    }

    /// Deliver the first input link
    pub fn offer_link_a(&mut self, link: QuantumLinkState) -> QnetResult<&SwapState> {
        match self.state {
            SwapState::AwaitingLinkA => {
                self.state = if link.success {
                    SwapState::AwaitingLinkB { link_a: link }
                } else {
                    SwapState::Failure(SwapFailure::LinkALost)
                };
                Ok(&self.state)
            }
            _ => Err(self.invalid("offer link A")),
        }
    }

    /// Deliver the second input link
    pub fn offer_link_b(&mut self, link: QuantumLinkState) -> QnetResult<&SwapState> {
        match self.state {
            SwapState::AwaitingLinkB { link_a } => {
                self.state = if link.success {
                    SwapState::Measuring {
                        link_a,
                        link_b: link,
                    }
                } else {
                    SwapState::Failure(SwapFailure::LinkBLost)
                };
                Ok(&self.state)
            }
            _ => Err(self.invalid("offer link B")),
        }
    }

    /// Perform the Bell-state measurement on both inputs
    pub fn measure<B>(&mut self, backend: &B, rng: &mut ShotRng) -> QnetResult<&SwapState>
    where
        B: QuantumBackend + ?Sized,
    {
        match self.state {
            SwapState::Measuring { link_a, link_b } => {
                let joined = backend.bell_state_measurement(&link_a, &link_b, rng);
                self.state = if joined.success {
                    SwapState::Success(joined)
                } else {
                    SwapState::Failure(SwapFailure::MeasurementFailed)
                };
                Ok(&self.state)
            }
            _ => Err(self.invalid("measure")),
        }
    }

    /// The joined link, once the swap succeeded
    pub fn outcome(&self) -> Option<QuantumLinkState> {
        match self.state {
            SwapState::Success(link) => Some(link),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<SwapFailure> {
        match self.state {
            SwapState::Failure(reason) => Some(reason),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> QnetError {
        QnetError::InvalidSwapTransition {
            station: self.station,
            state: self.state.name(),
            action,
        }
    }
}
