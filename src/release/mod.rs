//! Release sequencing
//!
//! Three-phase pattern matching [`crate::release_pr`]:
//! 1. Gather - find merged, still-pending release pull requests (effectful, see [`crate::manifest`])
//! 2. Plan - map their bodies to [`CandidateRelease`]s (pure, testable)
//! 3. Execute - lock, tag, label, comment, realign, unlock (effectful)

mod execute;
mod plan;

pub use execute::execute_releases;
pub use plan::{CandidateRelease, MergedReleasePullRequest, is_pending_release, plan_releases};
