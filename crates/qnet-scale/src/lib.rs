//! QNet Scaling
//!
//! Networks up to the simulation ceiling are simulated event by event, one
//! resident chain segment at a time. Beyond the ceiling the closed-form
//! model takes over, calibrated against simulations at smaller node counts.
//!
//! ```text
//!   NetworkConfig ──▶ BatchedNetworkBuilder
//!                        │
//!          node_count ≤ ceiling?
//!           │ yes                 │ no
//!           ▼                     ▼
//!     segmented chain      calibration runs (small n)
//!     run_shots                   │
//!           │              ExtrapolationParameters
//!           │                     │
//!           ▼                     ▼
//!     ScaleSummary         AnalyticalExtrapolator
//!     (simulated)          ScaleSummary (extrapolated)
//! ```
//!
//! Every summary carries its [`qnet_core::Confidence`] tag.

pub mod builder;
pub mod config;
pub mod extrapolate;

pub use builder::*;
pub use config::*;
pub use extrapolate::*;
