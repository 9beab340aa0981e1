//! QNet Shot Aggregation
//!
//! Runs a protocol as many independent trials. Each shot draws from its own
//! random stream derived from the master seed, so the same seed reproduces
//! the same report regardless of the order shots are executed in.
//!
//! Statistics always report the success rate next to the *conditional*
//! fidelity (mean over successful shots only).

pub mod shots;
pub mod stats;
pub mod sweep;

pub use shots::*;
pub use stats::*;
pub use sweep::*;
