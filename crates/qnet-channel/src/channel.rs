//! Fibre channel
//!
//! Loss follows the usual telecom attenuation law
//! `p = 10^(-α·L / 10)` for attenuation `α` in dB/km and length `L` in km.

use rand::Rng;
use serde::Serialize;

use qnet_core::{Fidelity, QnetError, QnetResult, QuantumLinkState, ShotRng, SimTime};

/// Speed of light in silica fibre (m/s)
pub const FIBER_LIGHT_SPEED_M_PER_S: f64 = 2.0e8;

/// Attenuation of standard telecom fibre at 1550 nm (dB/km)
pub const TELECOM_ATTENUATION_DB_PER_KM: f64 = 0.2;

/// Probability that a photon survives a channel
pub fn transmission_probability(length_km: f64, attenuation_db_per_km: f64) -> QnetResult<f64> {
    check_length(length_km)?;
    check_attenuation(attenuation_db_per_km)?;
    Ok(10f64.powf(-attenuation_db_per_km * length_km / 10.0))
}

/// Time a photon spends in a fibre of the given length
pub fn propagation_delay(length_km: f64) -> QnetResult<SimTime> {
    check_length(length_km)?;
    SimTime::from_secs_f64(length_km * 1_000.0 / FIBER_LIGHT_SPEED_M_PER_S)
}

fn check_length(length_km: f64) -> QnetResult<()> {
    if length_km.is_finite() && length_km > 0.0 {
        Ok(())
    } else {
        Err(QnetError::InvalidLength(length_km))
    }
}

fn check_attenuation(attenuation_db_per_km: f64) -> QnetResult<()> {
    if attenuation_db_per_km.is_finite() && attenuation_db_per_km > 0.0 {
        Ok(())
    } else {
        Err(QnetError::InvalidAttenuation(attenuation_db_per_km))
    }
}

/// A lossy fibre between two ports. Immutable for the duration of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Channel {
    length_km: f64,
    attenuation_db_per_km: f64,
    /// Fidelity of pairs emitted into this channel by its source
    pair_fidelity: Fidelity,
    /// Memory/photon coherence time; `None` means no decoherence
    decoherence_time: Option<SimTime>,
    transmission_probability: f64,
    propagation_delay: SimTime,
}

impl Channel {
    /// Create a channel with an ideal source and no decoherence
    pub fn new(length_km: f64, attenuation_db_per_km: f64) -> QnetResult<Self> {
        let transmission_probability = transmission_probability(length_km, attenuation_db_per_km)?;
        Ok(Channel {
            length_km,
            attenuation_db_per_km,
            pair_fidelity: Fidelity::PERFECT,
            decoherence_time: None,
            transmission_probability,
            propagation_delay: propagation_delay(length_km)?,
        })
    }

    /// Standard telecom fibre (0.2 dB/km)
    pub fn telecom(length_km: f64) -> QnetResult<Self> {
        Self::new(length_km, TELECOM_ATTENUATION_DB_PER_KM)
    }

    /// Set the fidelity of pairs emitted into this channel
    pub fn with_pair_fidelity(mut self, fidelity: Fidelity) -> Self {
        self.pair_fidelity = fidelity;
        self
    }

    /// Enable exponential decoherence with the given coherence time
    pub fn with_decoherence_time(mut self, coherence: SimTime) -> QnetResult<Self> {
        if coherence == SimTime::ZERO {
            return Err(QnetError::InvalidConfiguration(
                "decoherence time must be > 0".into(),
            ));
        }
        self.decoherence_time = Some(coherence);
        Ok(self)
    }

    pub fn length_km(&self) -> f64 {
        self.length_km
    }

    pub fn attenuation_db_per_km(&self) -> f64 {
        self.attenuation_db_per_km
    }

    /// Total loss over the channel (dB)
    pub fn attenuation_db(&self) -> f64 {
        self.attenuation_db_per_km * self.length_km
    }

    pub fn pair_fidelity(&self) -> Fidelity {
        self.pair_fidelity
    }

    pub fn decoherence_time(&self) -> Option<SimTime> {
        self.decoherence_time
    }

    pub fn transmission_probability(&self) -> f64 {
        self.transmission_probability
    }

    pub fn propagation_delay(&self) -> SimTime {
        self.propagation_delay
    }

    /// Multiplicative fidelity decay accumulated during the flight
    pub fn decay_factor(&self) -> f64 {
        match self.decoherence_time {
            Some(t) => (-self.propagation_delay.as_nanos() / t.as_nanos()).exp(),
            None => 1.0,
        }
    }

    /// Send one half of an existing pair through the channel.
    ///
    /// Draws exactly one uniform sample, so the stream advances the same way
    /// whether the photon survives or not.
    pub fn transmit(&self, state: QuantumLinkState, rng: &mut ShotRng) -> QuantumLinkState {
        let sample: f64 = rng.gen();
        if !state.success || sample >= self.transmission_probability {
            return QuantumLinkState::lost();
        }
        state.degrade(self.decay_factor())
    }

    /// One elementary pair attempt: emit a fresh pair and transmit one half
    pub fn attempt_transmission(&self, rng: &mut ShotRng) -> QuantumLinkState {
        self.transmit(QuantumLinkState::prepared(self.pair_fidelity), rng)
    }
}
