//! QNet Channel Model
//!
//! Physical loss and noise of an optical fibre link:
//! - Transmission probability from attenuation and length
//! - Seeded per-photon loss decisions
//! - Propagation delay at the speed of light in fibre
//! - Exponential decoherence over the flight time

pub mod channel;

pub use channel::*;
