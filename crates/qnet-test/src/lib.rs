//! QNet Test Harness
//!
//! This crate provides:
//! - Scenario presets for the reference experiments
//! - Tracing setup for tests and benches
//!
//! Integration and property tests live in `tests/`, criterion benches in
//! `benches/`.

pub mod scenarios;
pub mod tracing_setup;

pub use scenarios::*;
pub use tracing_setup::*;
