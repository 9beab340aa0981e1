//! Common interface of shot-based protocols

use qnet_core::{QnetResult, ShotId, ShotResult, ShotRng};
use qnet_scheduler::RunBudget;

/// A protocol that can be run as independent trials
pub trait ShotProtocol {
    /// Short human-readable label for logs and reports
    fn name(&self) -> &str;

    /// Elementary links spanned by one attempt
    fn hop_count(&self) -> u32;

    /// Run one trial.
    ///
    /// All randomness must come from `rng`. Errors are reserved for
    /// programming mistakes such as ordering violations.
    fn run_shot(&self, shot: ShotId, rng: &mut ShotRng, budget: RunBudget) -> QnetResult<ShotResult>;
}
