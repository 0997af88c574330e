//! History gateway
//!
//! Lazy, strictly sequential pagination over the platform's history pages,
//! plus the idempotent branch primitives built from the raw ref and
//! protection calls.

use crate::error::Result;
use crate::platform::{Page, PlatformService};
use crate::types::{
    Commit, CommitFileDetail, CompareStatus, ComparedCommit, GitHubRelease, GitHubTag,
    PullRequest, PullRequestStatus,
};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Page size for every history listing
pub const PAGE_SIZE: usize = 25;

type FetchPage<'a, T> = Box<dyn FnMut(Option<String>) -> BoxFuture<'a, Result<Page<T>>> + Send + 'a>;

/// A lazily paginated sequence.
///
/// At most one page request is in flight; the next cursor comes from the
/// previous response.
pub struct Paginated<'a, T> {
    fetch: FetchPage<'a, T>,
    buffer: VecDeque<T>,
    cursor: Option<String>,
    exhausted: bool,
    yielded: usize,
    max_results: Option<usize>,
}

impl<'a, T: Send + 'a> Paginated<'a, T> {
    fn new(max_results: Option<usize>, fetch: FetchPage<'a, T>) -> Self {
        Self {
            fetch,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
            yielded: 0,
            max_results,
        }
    }

    /// Next item, fetching the next page when the buffer runs dry
    pub async fn next(&mut self) -> Result<Option<T>> {
        if self.max_results.is_some_and(|max| self.yielded >= max) {
            return Ok(None);
        }
        while self.buffer.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            let page = (self.fetch)(self.cursor.take()).await?;
            self.buffer.extend(page.items);
            self.cursor = page.next_cursor;
            if self.cursor.is_none() {
                self.exhausted = true;
            }
        }
        self.yielded += 1;
        Ok(self.buffer.pop_front())
    }

    /// Drain the sequence into a vector
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

/// Options for the commit iterator
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitQuery {
    /// Stop after this many commits
    pub max_results: Option<usize>,
    /// Fetch complete file lists for commits that lack them
    pub backfill_files: bool,
}

/// Gateway over a platform service
#[derive(Clone, Copy)]
pub struct History<'a> {
    platform: &'a dyn PlatformService,
}

impl<'a> History<'a> {
    /// Wrap a platform service
    pub fn new(platform: &'a dyn PlatformService) -> Self {
        Self { platform }
    }

    /// The wrapped service
    pub fn platform(&self) -> &'a dyn PlatformService {
        self.platform
    }

    /// Commits on a branch, newest first
    pub fn commits(&self, branch: &str, query: CommitQuery) -> Paginated<'a, Commit> {
        let platform = self.platform;
        let branch = branch.to_string();
        Paginated::new(
            query.max_results,
            Box::new(move |cursor: Option<String>| {
                let branch = branch.clone();
                async move {
                    platform
                        .commit_page(&branch, cursor.as_deref(), PAGE_SIZE, query.backfill_files)
                        .await
                }
                .boxed()
            }),
        )
    }

    /// Pull requests targeting a branch
    pub fn pull_requests(
        &self,
        branch: &str,
        status: PullRequestStatus,
        max_results: Option<usize>,
        include_files: bool,
    ) -> Paginated<'a, PullRequest> {
        let platform = self.platform;
        let branch = branch.to_string();
        Paginated::new(
            max_results,
            Box::new(move |cursor: Option<String>| {
                let branch = branch.clone();
                async move {
                    platform
                        .pull_request_page(&branch, status, cursor.as_deref(), PAGE_SIZE, include_files)
                        .await
                }
                .boxed()
            }),
        )
    }

    /// Releases, generally most recent first
    pub fn releases(&self, max_results: Option<usize>) -> Paginated<'a, GitHubRelease> {
        let platform = self.platform;
        Paginated::new(
            max_results,
            Box::new(move |cursor: Option<String>| {
                async move { platform.release_page(cursor.as_deref(), PAGE_SIZE).await }.boxed()
            }),
        )
    }

    /// Tags, in API order
    pub fn tags(&self, max_results: Option<usize>) -> Paginated<'a, GitHubTag> {
        let platform = self.platform;
        Paginated::new(
            max_results,
            Box::new(move |cursor: Option<String>| {
                async move { platform.tag_page(cursor.as_deref(), PAGE_SIZE).await }.boxed()
            }),
        )
    }

    /// Open pull request whose head is `head_branch`, if any
    pub async fn find_open_pull_request(
        &self,
        base_branch: &str,
        head_branch: &str,
    ) -> Result<Option<PullRequest>> {
        let mut prs = self.pull_requests(base_branch, PullRequestStatus::Open, None, false);
        while let Some(pr) = prs.next().await? {
            if pr.head_branch_name == head_branch {
                return Ok(Some(pr));
            }
        }
        Ok(None)
    }

    /// Create `branch` at `from_sha`, or force it there if it exists.
    ///
    /// Safe to repeat: a second call with the same sha leaves the branch
    /// where the first one put it.
    pub async fn fork_or_reset_branch(&self, branch: &str, from_sha: &str) -> Result<String> {
        match self.platform.branch_sha(branch).await? {
            None => {
                debug!(branch, sha = from_sha, "creating branch");
                self.platform.create_branch(branch, from_sha).await?;
            }
            Some(current) if current == from_sha => {
                debug!(branch, sha = from_sha, "branch already at sha");
            }
            Some(_) => {
                debug!(branch, sha = from_sha, "resetting branch");
                self.platform.update_branch(branch, from_sha, true).await?;
            }
        }
        Ok(from_sha.to_string())
    }

    /// Make `branch` read-only through its protection rule
    pub async fn lock_branch(&self, branch: &str) -> Result<()> {
        self.set_branch_lock(branch, true).await
    }

    /// Lift the read-only flag from `branch`
    pub async fn unlock_branch(&self, branch: &str) -> Result<()> {
        self.set_branch_lock(branch, false).await
    }

    async fn set_branch_lock(&self, branch: &str, lock: bool) -> Result<()> {
        match self.platform.branch_protection(branch).await? {
            None if lock => {
                info!(branch, "creating locked protection rule");
                self.platform.create_branch_protection(branch, true).await?;
            }
            None => debug!(branch, "no protection rule, nothing to unlock"),
            Some(rule) if rule.lock_branch == lock => {
                debug!(branch, lock, "branch already in desired lock state");
            }
            Some(rule) => {
                info!(branch, lock, "updating branch lock");
                self.platform.update_branch_protection(&rule.id, lock).await?;
            }
        }
        Ok(())
    }

    /// Whether every commit of `a` is already represented in `b`.
    ///
    /// When the branches diverged, each commit unique to `a` must have a
    /// counterpart unique to `b` with the same message and the same file
    /// changes (path, status, additions, deletions).
    pub async fn compare_branches(&self, a: &str, b: &str) -> Result<bool> {
        let comparison = self.platform.compare_commits(a, b).await?;
        match comparison.status {
            CompareStatus::Identical | CompareStatus::Ahead => Ok(true),
            CompareStatus::Behind => Ok(false),
            CompareStatus::Diverged => {
                let only_in_b = comparison.commits;
                let only_in_a = self.platform.compare_commits(b, a).await?.commits;
                let a_details = self.with_files(&only_in_a).await?;
                let b_details = self.with_files(&only_in_b).await?;
                Ok(contents_match(&a_details, &b_details))
            }
        }
    }

    async fn with_files(
        &self,
        commits: &[ComparedCommit],
    ) -> Result<Vec<(String, Vec<CommitFileDetail>)>> {
        let files = try_join_all(commits.iter().map(|c| self.platform.commit_files(&c.sha))).await?;
        Ok(commits
            .iter()
            .map(|c| c.message.clone())
            .zip(files)
            .collect())
    }

    /// Force `source` to point at `target`'s current commit
    pub async fn align_branch(&self, source: &str, target: &str) -> Result<()> {
        let sha = self
            .platform
            .branch_sha(target)
            .await?
            .ok_or_else(|| crate::error::Error::Internal(format!("branch {target} not found")))?;
        info!(source, target, sha, "aligning branch");
        self.platform.update_branch(source, &sha, true).await
    }
}

/// Every entry of `a` has a content-identical entry in `b`
pub fn contents_match(
    a: &[(String, Vec<CommitFileDetail>)],
    b: &[(String, Vec<CommitFileDetail>)],
) -> bool {
    a.iter().all(|(message, files)| {
        let mut files = files.clone();
        files.sort_by(|x, y| x.filename.cmp(&y.filename));
        b.iter().any(|(other_message, other_files)| {
            let mut other_files = other_files.clone();
            other_files.sort_by(|x, y| x.filename.cmp(&y.filename));
            message == other_message && files == other_files
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(name: &str, additions: u64) -> CommitFileDetail {
        CommitFileDetail {
            filename: name.to_string(),
            status: "modified".to_string(),
            additions,
            deletions: 0,
        }
    }

    #[test]
    fn test_contents_match_requires_same_stats() {
        let a = vec![("fix: x".to_string(), vec![detail("a.rs", 1)])];
        let same = vec![("fix: x".to_string(), vec![detail("a.rs", 1)])];
        let different_stats = vec![("fix: x".to_string(), vec![detail("a.rs", 2)])];
        let different_message = vec![("fix: y".to_string(), vec![detail("a.rs", 1)])];

        assert!(contents_match(&a, &same));
        assert!(!contents_match(&a, &different_stats));
        assert!(!contents_match(&a, &different_message));
        assert!(contents_match(&[], &same));
    }

    #[test]
    fn test_contents_match_ignores_file_order() {
        let a = vec![(
            "feat: y".to_string(),
            vec![detail("b.rs", 1), detail("a.rs", 3)],
        )];
        let b = vec![(
            "feat: y".to_string(),
            vec![detail("a.rs", 3), detail("b.rs", 1)],
        )];
        assert!(contents_match(&a, &b));
    }
}
