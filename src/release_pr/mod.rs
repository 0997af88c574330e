//! Release pull request assembly
//!
//! Three-phase pattern:
//! 1. Gather - resolve versions and collect commits (effectful, see [`crate::manifest`])
//! 2. Plan - turn candidates into [`ReleasePullRequest`]s (pure, testable)
//! 3. Execute - reconcile with existing pull requests and push (effectful)

pub mod body;
mod execute;
pub mod filter;
mod plan;
pub mod title;

pub use execute::{PullRequestAction, PullRequestOutcome, execute_release_pull_requests};
pub use plan::{
    PlanContext, build_candidate, build_pull_request, commits_since, plan_pull_requests,
    with_custom_version,
};

use crate::branch_name::BranchName;
use crate::commit::ConventionalCommit;
use crate::config::ComponentConfig;
use crate::strategy::Update;
use crate::version::{BumpKind, Version};
use body::PullRequestBody;
use title::PullRequestTitle;

/// Which pull request a component release lands in
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PullRequestGroup {
    /// The shared manifest pull request
    Combined,
    /// A pull request of its own, keyed by component name
    Separate(String),
    /// A named group, e.g. linked versions
    Named(String),
}

/// A component that may be released in this run.
///
/// This is the state plugins transform; `version` is `None` when nothing
/// qualifies and no plugin forces a release.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Resolved component configuration
    pub config: ComponentConfig,
    /// Last released version
    pub current: Option<Version>,
    /// Tag of the last release, for compare links
    pub previous_tag: Option<String>,
    /// Commits since the last release that touch the component
    pub commits: Vec<ConventionalCommit>,
    /// Proposed next version
    pub version: Option<Version>,
    /// Pull request the release lands in
    pub group: PullRequestGroup,
}

impl Candidate {
    /// Default group for a component
    pub fn default_group(config: &ComponentConfig) -> PullRequestGroup {
        if config.separate_pull_requests {
            PullRequestGroup::Separate(
                config
                    .component
                    .clone()
                    .unwrap_or_else(|| config.path.clone()),
            )
        } else {
            PullRequestGroup::Combined
        }
    }
}

/// One component release inside a release pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRelease {
    /// Component path
    pub path: String,
    /// Component name
    pub component: Option<String>,
    /// Version being replaced
    pub previous: Option<Version>,
    /// Tag of the release being replaced
    pub previous_tag: Option<String>,
    /// New version
    pub version: Version,
    /// Contributing commits
    pub commits: Vec<ConventionalCommit>,
    /// Release notes block
    pub notes: String,
}

impl PlannedRelease {
    /// Kind of change from `previous` to `version`
    pub fn bump_kind(&self) -> Option<BumpKind> {
        self.previous
            .as_ref()
            .and_then(|previous| self.version.compare_bump(previous))
    }
}

/// A release pull request, not yet (or not yet again) pushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePullRequest {
    /// Structured title
    pub title: PullRequestTitle,
    /// Structured body
    pub body: PullRequestBody,
    /// Head branch
    pub head_branch: BranchName,
    /// Branch the pull request merges into
    pub target_branch: String,
    /// Group the pull request was built for
    pub group: PullRequestGroup,
    /// Component releases, in path order
    pub releases: Vec<PlannedRelease>,
    /// File updates to push
    pub updates: Vec<Update>,
    /// Labels to apply
    pub labels: Vec<String>,
    /// Open as draft
    pub draft: bool,
}

impl ReleasePullRequest {
    /// Every contributing commit across components
    pub fn commits(&self) -> impl Iterator<Item = &ConventionalCommit> {
        self.releases.iter().flat_map(|r| r.commits.iter())
    }
}
