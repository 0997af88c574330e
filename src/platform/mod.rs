//! Platform service for the hosting API
//!
//! [`PlatformService`] is the single seam between the orchestration logic and
//! GitHub. History is exposed page by page; [`crate::history`] turns pages into
//! lazy sequences and composes the branch primitives.

mod github;
mod graphql;
pub mod retry;

pub use github::GitHubService;

use crate::error::Result;
use crate::types::{
    BranchProtection, Commit, CommitFileDetail, Comparison, FileChange, GitHubRelease, GitHubTag,
    PlatformConfig, PullRequest, PullRequestRequest, PullRequestStatus, ReleaseRequest,
};
use async_trait::async_trait;

/// One page of a paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// An empty final page
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Hosting platform operations used by the release orchestration
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;

    // =========================================================================
    // History
    // =========================================================================

    /// One page of commits on a branch, newest first.
    ///
    /// A missing branch yields an empty page. With `backfill_files`, commits
    /// whose file list is missing or truncated get their full file list.
    async fn commit_page(
        &self,
        branch: &str,
        cursor: Option<&str>,
        per_page: usize,
        backfill_files: bool,
    ) -> Result<Page<Commit>>;

    /// One page of pull requests targeting a branch, newest first
    async fn pull_request_page(
        &self,
        branch: &str,
        status: PullRequestStatus,
        cursor: Option<&str>,
        per_page: usize,
        include_files: bool,
    ) -> Result<Page<PullRequest>>;

    /// One page of releases, generally most recent first
    async fn release_page(&self, cursor: Option<&str>, per_page: usize)
    -> Result<Page<GitHubRelease>>;

    /// One page of tags
    async fn tag_page(&self, cursor: Option<&str>, per_page: usize) -> Result<Page<GitHubTag>>;

    /// Files of a single commit with change statistics
    async fn commit_files(&self, sha: &str) -> Result<Vec<CommitFileDetail>>;

    // =========================================================================
    // Refs
    // =========================================================================

    /// Sha a branch points at, or `None` if the branch does not exist
    async fn branch_sha(&self, branch: &str) -> Result<Option<String>>;

    /// Create a branch at a sha
    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()>;

    /// Move a branch to a sha
    async fn update_branch(&self, branch: &str, sha: &str, force: bool) -> Result<()>;

    /// Compare `base...head`
    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison>;

    // =========================================================================
    // Branch protection
    // =========================================================================

    /// Protection rule whose pattern is exactly `branch`
    async fn branch_protection(&self, branch: &str) -> Result<Option<BranchProtection>>;

    /// Create a protection rule for `branch`
    async fn create_branch_protection(
        &self,
        branch: &str,
        lock_branch: bool,
    ) -> Result<BranchProtection>;

    /// Change only the lock flag of an existing rule
    async fn update_branch_protection(
        &self,
        rule_id: &str,
        lock_branch: bool,
    ) -> Result<BranchProtection>;

    // =========================================================================
    // Files
    // =========================================================================

    /// Content of a file on a branch; [`crate::error::Error::FileNotFound`] on a miss
    async fn file_contents(&self, path: &str, branch: &str) -> Result<String>;

    /// Commit files on top of `parent_sha` and move `branch` to the new commit
    async fn push_files(
        &self,
        branch: &str,
        parent_sha: &str,
        message: &str,
        files: &[FileChange],
    ) -> Result<String>;

    // =========================================================================
    // Pull requests
    // =========================================================================

    /// Get a pull request by number
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest>;

    /// Open a pull request
    async fn create_pull_request(&self, request: &PullRequestRequest) -> Result<PullRequest>;

    /// Replace the title and body of a pull request
    async fn update_pull_request(&self, number: u64, title: &str, body: &str)
    -> Result<PullRequest>;

    /// Reopen a closed pull request
    async fn reopen_pull_request(&self, number: u64) -> Result<()>;

    /// Add labels to a pull request
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()>;

    /// Remove one label; removing an absent label succeeds
    async fn remove_label(&self, number: u64, label: &str) -> Result<()>;

    /// Comment on a pull request
    async fn create_comment(&self, number: u64, body: &str) -> Result<()>;

    /// Request reviews
    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<()>;

    /// Turn on auto-merge with a merge method (`squash`, `merge`, `rebase`)
    async fn enable_auto_merge(&self, number: u64, merge_method: &str) -> Result<()>;

    // =========================================================================
    // Releases
    // =========================================================================

    /// Create a release; [`crate::error::Error::DuplicateRelease`] if the tag exists
    async fn create_release(&self, request: &ReleaseRequest) -> Result<GitHubRelease>;

    /// Look a release up by tag through the read path
    async fn release_by_tag(&self, tag: &str) -> Result<Option<GitHubRelease>>;
}
