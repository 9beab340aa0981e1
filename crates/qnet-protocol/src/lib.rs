//! QNet Protocols
//!
//! Entanglement distribution protocols running on the event scheduler.
//!
//! # Protocols
//!
//! - Bell-pair source: a midpoint source shares a pair between two nodes
//! - Entanglement swap: Bell-state measurement joining two links at a node
//! - Repeater chain: left-to-right folding of swaps along a line of nodes
//! - Quantum switch: a hub swapping the links of two chosen clients
//!
//! Every protocol implements [`ShotProtocol`]: one call runs one
//! independent trial with its own random stream and produces a
//! [`qnet_core::ShotResult`]. Losses and failed measurements are ordinary
//! outcomes, never errors.

pub mod bell_pair;
pub mod chain;
pub mod protocol;
pub mod swap;
pub mod switch;
pub mod topology;

pub use bell_pair::*;
pub use chain::*;
pub use protocol::*;
pub use swap::*;
pub use switch::*;
pub use topology::*;
