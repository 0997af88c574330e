//! Core types for release-manifest

use serde::{Deserialize, Serialize};

/// Path of the component living at the repository root
pub const ROOT_PROJECT_PATH: &str = ".";

/// A pull request as seen by the history gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Head branch name
    pub head_branch_name: String,
    /// Base branch name
    pub base_branch_name: String,
    /// PR title
    pub title: String,
    /// PR body text
    pub body: String,
    /// Label names
    pub labels: Vec<String>,
    /// Merge commit sha, set once merged
    pub merge_commit_oid: Option<String>,
    /// Files touched (may be a truncated page)
    pub files: Vec<String>,
    /// Web URL for the PR
    pub html_url: String,
    /// Whether the PR is a draft
    pub draft: bool,
}

/// A commit, newest-first as returned by the commit iterator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit sha
    pub sha: String,
    /// Raw commit message
    pub message: String,
    /// Files touched; empty when not backfilled
    pub files: Vec<String>,
    /// Merged pull request whose merge commit is this commit
    pub pull_request: Option<PullRequest>,
}

/// Pull request state filter for the pull request iterator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    /// Open pull requests
    Open,
    /// Merged pull requests
    Merged,
    /// Closed without merging
    Closed,
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Merged => write!(f, "MERGED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A release on the hosting platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubRelease {
    /// Release id, when known
    pub id: Option<u64>,
    /// Release name
    pub name: Option<String>,
    /// Tag name
    pub tag_name: String,
    /// Commit sha the tag points at
    pub sha: String,
    /// Release notes
    pub notes: Option<String>,
    /// Web URL
    pub url: String,
    /// Draft flag
    pub draft: bool,
    /// Prerelease flag
    pub prerelease: bool,
}

/// A git tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubTag {
    /// Tag name
    pub name: String,
    /// Commit sha
    pub sha: String,
}

/// Request to create a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// Tag to create
    pub tag_name: String,
    /// Commit the tag should point at
    pub sha: String,
    /// Release name
    pub name: String,
    /// Release notes
    pub notes: String,
    /// Draft flag
    pub draft: bool,
    /// Prerelease flag
    pub prerelease: bool,
}

/// Request to open a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRequest {
    /// Head branch
    pub head: String,
    /// Base branch
    pub base: String,
    /// Title
    pub title: String,
    /// Body
    pub body: String,
    /// Draft flag
    pub draft: bool,
}

/// A file with its full new content, ready to push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative path
    pub path: String,
    /// New file content
    pub content: String,
}

/// A file entry of a commit, as used for content comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFileDetail {
    /// File path
    pub filename: String,
    /// added / modified / removed / renamed
    pub status: String,
    /// Lines added
    pub additions: u64,
    /// Lines deleted
    pub deletions: u64,
}

/// A commit from a branch comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparedCommit {
    /// Commit sha
    pub sha: String,
    /// Commit message
    pub message: String,
}

/// Relationship between two refs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareStatus {
    /// Head contains base plus more commits
    Ahead,
    /// Head is missing commits from base
    Behind,
    /// Same commit
    Identical,
    /// Both sides have unique commits
    Diverged,
}

/// Result of comparing `base...head`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Relationship of head to base
    pub status: CompareStatus,
    /// Commits reachable from head but not base
    pub commits: Vec<ComparedCommit>,
}

/// A branch protection rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchProtection {
    /// Rule node id
    pub id: String,
    /// Branch pattern the rule applies to
    pub pattern: String,
    /// Whether the branch is locked (read-only)
    pub lock_branch: bool,
}

/// Which history transport the GitHub service uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    /// GraphQL queries with pull request association
    #[default]
    GraphQl,
    /// Plain REST listing
    Rest,
}

/// Platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}

impl PlatformConfig {
    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Web URL of the repository, used for changelog links
    pub fn web_url(&self) -> String {
        let host = self.host.as_deref().unwrap_or("github.com");
        format!("https://{host}/{}/{}", self.owner, self.repo)
    }
}
