//! Error types for QNet
//!
//! Only invalid configuration and internal ordering violations are errors.
//! Photon loss, failed measurements, exhausted run budgets and calibration
//! runs without a single success are ordinary data carried in results.

use thiserror::Error;

use crate::{EventTag, NodeId, SimTime};

/// Core QNet errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QnetError {
    // Scheduler errors
    #[error("Ordering violation: event at {requested} scheduled before current time {now}")]
    OrderingViolation { now: SimTime, requested: SimTime },

    #[error("Invalid timestamp: {0} ns")]
    InvalidTimestamp(f64),

    // Physical parameter errors
    #[error("Invalid channel length: {0} km (must be finite and > 0)")]
    InvalidLength(f64),

    #[error("Invalid attenuation: {0} dB/km (must be finite and > 0)")]
    InvalidAttenuation(f64),

    #[error("Fidelity out of range: {0}")]
    FidelityOutOfRange(f64),

    #[error("Probability out of range: {0}")]
    ProbabilityOutOfRange(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Memory budget exceeded: need {required} bytes, budget is {budget} bytes")]
    MemoryBudgetExceeded { required: usize, budget: usize },

    // Protocol errors
    #[error("Invalid swap transition at {station}: cannot {action} while {state}")]
    InvalidSwapTransition {
        station: NodeId,
        state: &'static str,
        action: &'static str,
    },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unexpected {kind} event in {protocol}")]
    UnexpectedEvent {
        kind: EventTag,
        protocol: &'static str,
    },

    #[error("Protocol stalled: {0}")]
    ProtocolStalled(String),
}

impl QnetError {
    /// Errors raised while validating parameters, before any event runs
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            QnetError::InvalidTimestamp(_)
                | QnetError::InvalidLength(_)
                | QnetError::InvalidAttenuation(_)
                | QnetError::FidelityOutOfRange(_)
                | QnetError::ProbabilityOutOfRange(_)
                | QnetError::InvalidConfiguration(_)
                | QnetError::MemoryBudgetExceeded { .. }
        )
    }
}

/// Result type for QNet operations
pub type QnetResult<T> = Result<T, QnetError>;

/// Validate a probability in [0, 1]
pub fn check_probability(p: f64) -> QnetResult<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(QnetError::ProbabilityOutOfRange(p))
    }
}
