//! QNet Core - Fundamental types for quantum repeater simulation
//!
//! This crate defines the vocabulary shared by every QNet crate:
//! - Identifiers (NodeId, ShotId)
//! - Simulation time (SimTime)
//! - Fidelity bookkeeping (Fidelity, QuantumLinkState)
//! - The quantum-primitive capability (QuantumBackend)
//! - Event vocabulary for the discrete-event scheduler
//! - Per-shot random streams
//! - Shot results and their provenance tag
//! - Errors

pub mod backend;
pub mod error;
pub mod event;
pub mod fidelity;
pub mod id;
pub mod result;
pub mod rng;
pub mod time;

pub use backend::*;
pub use error::*;
pub use event::*;
pub use fidelity::*;
pub use id::*;
pub use result::*;
pub use rng::*;
pub use time::*;
