//! Mock platform service for testing
//!
//! An in-memory repository: branches with their files and commit history,
//! pull requests, releases, tags and branch protection rules. Every write is
//! recorded so tests can assert on what the orchestration did.

#![allow(dead_code)]

use async_trait::async_trait;
use release_manifest::error::{ApiError, Error, Result};
use release_manifest::platform::{Page, PlatformService};
use release_manifest::types::{
    BranchProtection, Commit, CommitFileDetail, CompareStatus, Comparison, FileChange,
    GitHubRelease, GitHubTag, PlatformConfig, PullRequest, PullRequestRequest, PullRequestStatus,
    ReleaseRequest,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Call record for `create_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePullRequestCall {
    pub head: String,
    pub base: String,
    pub title: String,
    pub draft: bool,
}

/// Call record for `push_files`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFilesCall {
    pub branch: String,
    pub parent_sha: String,
    pub paths: Vec<String>,
}

/// Call record for `create_comment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCall {
    pub number: u64,
    pub body: String,
}

#[derive(Debug, Clone)]
struct Branch {
    sha: String,
    /// Newest first
    commits: Vec<Commit>,
    files: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredPullRequest {
    pr: PullRequest,
    status: PullRequestStatus,
}

#[derive(Default)]
struct Calls {
    create_branch: Vec<(String, String)>,
    update_branch: Vec<(String, String)>,
    push_files: Vec<PushFilesCall>,
    create_pull_request: Vec<CreatePullRequestCall>,
    update_pull_request: Vec<u64>,
    reopen_pull_request: Vec<u64>,
    comments: Vec<CommentCall>,
    request_reviewers: Vec<(u64, Vec<String>)>,
    auto_merge: Vec<(u64, String)>,
    create_release: Vec<String>,
    protection: Vec<(String, bool)>,
}

#[derive(Default)]
struct State {
    branches: HashMap<String, Branch>,
    pull_requests: Vec<StoredPullRequest>,
    releases: Vec<GitHubRelease>,
    tags: Vec<GitHubTag>,
    protection: HashMap<String, BranchProtection>,
    commit_files: HashMap<String, Vec<CommitFileDetail>>,
    next_number: u64,
    next_sha: u64,
    calls: Calls,
    // Error injection
    deny_protection: bool,
    fail_remove_label: bool,
    hidden_release_lookups: u32,
}

impl State {
    fn new_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("sha{:04}", self.next_sha)
    }

    /// Files and history of whichever branch currently sits at `sha`
    fn snapshot(&self, sha: &str) -> (Vec<Commit>, BTreeMap<String, String>) {
        self.branches
            .values()
            .find(|b| b.sha == sha)
            .map(|b| (b.commits.clone(), b.files.clone()))
            .unwrap_or_default()
    }

    fn pull_request_mut(&mut self, number: u64) -> Result<&mut StoredPullRequest> {
        self.pull_requests
            .iter_mut()
            .find(|p| p.pr.number == number)
            .ok_or_else(|| not_found(&format!("pull request #{number}")))
    }
}

fn not_found(what: &str) -> Error {
    Error::from_api(ApiError::with_status(404, format!("{what} not found"), None))
}

fn paginate<T: Clone>(items: &[T], cursor: Option<&str>, per_page: usize) -> Page<T> {
    let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
    let end = (start + per_page).min(items.len());
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        next_cursor: (end < items.len()).then(|| end.to_string()),
    }
}

/// Mock platform service for testing
///
/// This manually implements `PlatformService` rather than using mockall,
/// because the service is stateful: pull requests opened by one run are
/// found again by the next.
///
/// Features:
/// - Branches carry files and newest-first history
/// - Auto-incrementing pull request numbers and commit shas
/// - Call tracking for verification
/// - Error injection for failure path testing
pub struct MockPlatformService {
    config: PlatformConfig,
    state: Mutex<State>,
}

impl MockPlatformService {
    /// Repository `test/repo` with an empty `main` branch
    pub fn new() -> Self {
        let mock = Self {
            config: PlatformConfig {
                owner: "test".to_string(),
                repo: "repo".to_string(),
                host: None,
            },
            state: Mutex::new(State::default()),
        };
        mock.add_branch("main");
        mock
    }

    // === Repository setup ===

    /// Create an empty branch
    pub fn add_branch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let sha = state.new_sha();
        state.branches.insert(
            name.to_string(),
            Branch {
                sha,
                commits: Vec::new(),
                files: BTreeMap::new(),
            },
        );
    }

    /// Land a commit on `branch`; returns its sha
    pub fn commit(&self, branch: &str, message: &str, files: &[&str]) -> String {
        let mut state = self.state.lock().unwrap();
        let sha = state.new_sha();
        let commit = Commit {
            sha: sha.clone(),
            message: message.to_string(),
            files: files.iter().map(ToString::to_string).collect(),
            pull_request: None,
        };
        let branch = state.branches.get_mut(branch).unwrap();
        branch.commits.insert(0, commit);
        branch.sha = sha.clone();
        sha
    }

    /// Write a file on `branch` without creating a commit
    pub fn set_file(&self, branch: &str, path: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .branches
            .get_mut(branch)
            .unwrap()
            .files
            .insert(path.to_string(), content.to_string());
    }

    /// Record an existing release
    pub fn add_release(&self, tag: &str, sha: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.releases.len() as u64 + 1;
        state.releases.insert(
            0,
            GitHubRelease {
                id: Some(id),
                name: Some(tag.to_string()),
                tag_name: tag.to_string(),
                sha: sha.to_string(),
                notes: None,
                url: format!("https://github.com/test/repo/releases/tag/{tag}"),
                draft: false,
                prerelease: false,
            },
        );
    }

    /// Record an existing tag without a release
    pub fn add_tag(&self, tag: &str, sha: &str) {
        self.state.lock().unwrap().tags.push(GitHubTag {
            name: tag.to_string(),
            sha: sha.to_string(),
        });
    }

    /// Record file statistics for a commit, used by branch comparison
    pub fn set_commit_files(&self, sha: &str, files: Vec<CommitFileDetail>) {
        self.state
            .lock()
            .unwrap()
            .commit_files
            .insert(sha.to_string(), files);
    }

    /// Add an already merged pull request; returns its number
    pub fn add_merged_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
        labels: &[&str],
        merge_sha: &str,
    ) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_number += 1;
        let number = state.next_number;
        state.pull_requests.push(StoredPullRequest {
            pr: PullRequest {
                number,
                head_branch_name: head.to_string(),
                base_branch_name: base.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                labels: labels.iter().map(ToString::to_string).collect(),
                merge_commit_oid: Some(merge_sha.to_string()),
                files: Vec::new(),
                html_url: format!("https://github.com/test/repo/pull/{number}"),
                draft: false,
            },
            status: PullRequestStatus::Merged,
        });
        number
    }

    /// Squash-merge an open pull request into its base branch.
    ///
    /// The head branch's files are copied onto the base and a merge commit
    /// carrying the pull request is landed. Returns the merge sha.
    pub fn merge_pull_request(&self, number: u64) -> String {
        let mut state = self.state.lock().unwrap();
        let sha = state.new_sha();
        let stored = state.pull_request_mut(number).unwrap();
        stored.status = PullRequestStatus::Merged;
        stored.pr.merge_commit_oid = Some(sha.clone());
        let pr = stored.pr.clone();

        let head_files = state.branches[&pr.head_branch_name].files.clone();
        let base = state.branches.get_mut(&pr.base_branch_name).unwrap();
        let changed: Vec<String> = head_files
            .iter()
            .filter(|(path, content)| base.files.get(*path) != Some(*content))
            .map(|(path, _)| path.clone())
            .collect();
        base.files.extend(head_files);
        let mut merged = pr.clone();
        merged.files.clone_from(&changed);
        base.commits.insert(
            0,
            Commit {
                sha: sha.clone(),
                message: format!("{} (#{number})", pr.title),
                files: changed.clone(),
                pull_request: Some(merged),
            },
        );
        base.sha = sha.clone();
        state.pull_request_mut(number).unwrap().pr.files = changed;
        sha
    }

    /// Close a pull request, adding the given labels
    pub fn close_pull_request(&self, number: u64, labels: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let stored = state.pull_request_mut(number).unwrap();
        stored.status = PullRequestStatus::Closed;
        stored
            .pr
            .labels
            .extend(labels.iter().map(ToString::to_string));
    }

    /// Simulate a human editing a pull request title and labels
    pub fn edit_pull_request(&self, number: u64, title: &str, add_labels: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let stored = state.pull_request_mut(number).unwrap();
        stored.pr.title = title.to_string();
        stored
            .pr
            .labels
            .extend(add_labels.iter().map(ToString::to_string));
    }

    // === Error injection methods ===

    /// Make branch protection writes fail with 403
    pub fn deny_branch_protection(&self) {
        self.state.lock().unwrap().deny_protection = true;
    }

    /// Make every label removal fail
    pub fn fail_remove_label(&self) {
        self.state.lock().unwrap().fail_remove_label = true;
    }

    /// Hide newly created releases from the read path for `lookups` lookups
    pub fn hide_releases_for(&self, lookups: u32) {
        self.state.lock().unwrap().hidden_release_lookups = lookups;
    }

    // === Inspection ===

    /// Pull request by number
    pub fn pull_request(&self, number: u64) -> PullRequest {
        let mut state = self.state.lock().unwrap();
        state.pull_request_mut(number).unwrap().pr.clone()
    }

    /// Status of a pull request
    pub fn pull_request_status(&self, number: u64) -> PullRequestStatus {
        let mut state = self.state.lock().unwrap();
        state.pull_request_mut(number).unwrap().status
    }

    /// Current content of a file on a branch
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.branches.get(branch)?.files.get(path).cloned()
    }

    /// Current sha of a branch
    pub fn sha(&self, branch: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.branches.get(branch).map(|b| b.sha.clone())
    }

    /// Every release, newest first
    pub fn releases(&self) -> Vec<GitHubRelease> {
        self.state.lock().unwrap().releases.clone()
    }

    /// Protection rule of a branch
    pub fn protection(&self, branch: &str) -> Option<BranchProtection> {
        self.state.lock().unwrap().protection.get(branch).cloned()
    }

    pub fn create_branch_calls(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().calls.create_branch.clone()
    }

    pub fn update_branch_calls(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().calls.update_branch.clone()
    }

    pub fn push_files_calls(&self) -> Vec<PushFilesCall> {
        self.state.lock().unwrap().calls.push_files.clone()
    }

    pub fn create_pull_request_calls(&self) -> Vec<CreatePullRequestCall> {
        self.state.lock().unwrap().calls.create_pull_request.clone()
    }

    pub fn update_pull_request_calls(&self) -> Vec<u64> {
        self.state.lock().unwrap().calls.update_pull_request.clone()
    }

    pub fn reopen_pull_request_calls(&self) -> Vec<u64> {
        self.state.lock().unwrap().calls.reopen_pull_request.clone()
    }

    pub fn comments(&self) -> Vec<CommentCall> {
        self.state.lock().unwrap().calls.comments.clone()
    }

    pub fn request_reviewers_calls(&self) -> Vec<(u64, Vec<String>)> {
        self.state.lock().unwrap().calls.request_reviewers.clone()
    }

    pub fn auto_merge_calls(&self) -> Vec<(u64, String)> {
        self.state.lock().unwrap().calls.auto_merge.clone()
    }

    pub fn create_release_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.create_release.clone()
    }

    /// Every lock flag written to a protection rule, in order
    pub fn protection_calls(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().calls.protection.clone()
    }
}

impl Default for MockPlatformService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn commit_page(
        &self,
        branch: &str,
        cursor: Option<&str>,
        per_page: usize,
        _backfill_files: bool,
    ) -> Result<Page<Commit>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .branches
            .get(branch)
            .map_or_else(Page::empty, |b| paginate(&b.commits, cursor, per_page)))
    }

    async fn pull_request_page(
        &self,
        branch: &str,
        status: PullRequestStatus,
        cursor: Option<&str>,
        per_page: usize,
        include_files: bool,
    ) -> Result<Page<PullRequest>> {
        let state = self.state.lock().unwrap();
        let matching: Vec<PullRequest> = state
            .pull_requests
            .iter()
            .rev()
            .filter(|p| p.status == status && p.pr.base_branch_name == branch)
            .map(|p| {
                let mut pr = p.pr.clone();
                if !include_files {
                    pr.files.clear();
                }
                pr
            })
            .collect();
        Ok(paginate(&matching, cursor, per_page))
    }

    async fn release_page(
        &self,
        cursor: Option<&str>,
        per_page: usize,
    ) -> Result<Page<GitHubRelease>> {
        let state = self.state.lock().unwrap();
        Ok(paginate(&state.releases, cursor, per_page))
    }

    async fn tag_page(&self, cursor: Option<&str>, per_page: usize) -> Result<Page<GitHubTag>> {
        let state = self.state.lock().unwrap();
        Ok(paginate(&state.tags, cursor, per_page))
    }

    async fn commit_files(&self, sha: &str) -> Result<Vec<CommitFileDetail>> {
        let state = self.state.lock().unwrap();
        Ok(state.commit_files.get(sha).cloned().unwrap_or_default())
    }

    async fn branch_sha(&self, branch: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.branches.get(branch).map(|b| b.sha.clone()))
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .create_branch
            .push((branch.to_string(), sha.to_string()));
        if state.branches.contains_key(branch) {
            return Err(Error::from_api(ApiError::with_status(
                422,
                "Reference already exists",
                None,
            )));
        }
        let (commits, files) = state.snapshot(sha);
        state.branches.insert(
            branch.to_string(),
            Branch {
                sha: sha.to_string(),
                commits,
                files,
            },
        );
        Ok(())
    }

    async fn update_branch(&self, branch: &str, sha: &str, _force: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .update_branch
            .push((branch.to_string(), sha.to_string()));
        let (commits, files) = state.snapshot(sha);
        let target = state
            .branches
            .get_mut(branch)
            .ok_or_else(|| not_found(branch))?;
        target.sha = sha.to_string();
        target.commits = commits;
        target.files = files;
        Ok(())
    }

    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison> {
        let state = self.state.lock().unwrap();
        let base = state.branches.get(base).ok_or_else(|| not_found(base))?;
        let head = state.branches.get(head).ok_or_else(|| not_found(head))?;
        let status = if base.sha == head.sha {
            CompareStatus::Identical
        } else if head.commits.iter().any(|c| c.sha == base.sha) {
            CompareStatus::Ahead
        } else if base.commits.iter().any(|c| c.sha == head.sha) {
            CompareStatus::Behind
        } else {
            CompareStatus::Diverged
        };
        let commits = head
            .commits
            .iter()
            .take_while(|c| c.sha != base.sha)
            .filter(|c| !base.commits.iter().any(|b| b.sha == c.sha))
            .map(|c| release_manifest::types::ComparedCommit {
                sha: c.sha.clone(),
                message: c.message.clone(),
            })
            .collect();
        Ok(Comparison { status, commits })
    }

    async fn branch_protection(&self, branch: &str) -> Result<Option<BranchProtection>> {
        Ok(self.state.lock().unwrap().protection.get(branch).cloned())
    }

    async fn create_branch_protection(
        &self,
        branch: &str,
        lock_branch: bool,
    ) -> Result<BranchProtection> {
        let mut state = self.state.lock().unwrap();
        if state.deny_protection {
            return Err(Error::from_api(ApiError::with_status(
                403,
                "Resource not accessible by integration",
                None,
            )));
        }
        state
            .calls
            .protection
            .push((branch.to_string(), lock_branch));
        let rule = BranchProtection {
            id: format!("rule-{branch}"),
            pattern: branch.to_string(),
            lock_branch,
        };
        state.protection.insert(branch.to_string(), rule.clone());
        Ok(rule)
    }

    async fn update_branch_protection(
        &self,
        rule_id: &str,
        lock_branch: bool,
    ) -> Result<BranchProtection> {
        let mut state = self.state.lock().unwrap();
        if state.deny_protection {
            return Err(Error::from_api(ApiError::new("denied").typed("FORBIDDEN")));
        }
        let rule = state
            .protection
            .values_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| not_found(rule_id))?;
        rule.lock_branch = lock_branch;
        let rule = rule.clone();
        state
            .calls
            .protection
            .push((rule.pattern.clone(), lock_branch));
        Ok(rule)
    }

    async fn file_contents(&self, path: &str, branch: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .branches
            .get(branch)
            .and_then(|b| b.files.get(path))
            .cloned()
            .ok_or_else(|| Error::FileNotFound {
                path: path.to_string(),
                branch: branch.to_string(),
            })
    }

    async fn push_files(
        &self,
        branch: &str,
        parent_sha: &str,
        message: &str,
        files: &[FileChange],
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push_files.push(PushFilesCall {
            branch: branch.to_string(),
            parent_sha: parent_sha.to_string(),
            paths: files.iter().map(|f| f.path.clone()).collect(),
        });
        let sha = state.new_sha();
        let target = state
            .branches
            .get_mut(branch)
            .ok_or_else(|| not_found(branch))?;
        for file in files {
            target.files.insert(file.path.clone(), file.content.clone());
        }
        target.commits.insert(
            0,
            Commit {
                sha: sha.clone(),
                message: message.to_string(),
                files: files.iter().map(|f| f.path.clone()).collect(),
                pull_request: None,
            },
        );
        target.sha = sha.clone();
        Ok(sha)
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        let mut state = self.state.lock().unwrap();
        Ok(state.pull_request_mut(number)?.pr.clone())
    }

    async fn create_pull_request(&self, request: &PullRequestRequest) -> Result<PullRequest> {
        let mut state = self.state.lock().unwrap();
        state.calls.create_pull_request.push(CreatePullRequestCall {
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
            draft: request.draft,
        });
        state.next_number += 1;
        let number = state.next_number;
        let pr = PullRequest {
            number,
            head_branch_name: request.head.clone(),
            base_branch_name: request.base.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            labels: Vec::new(),
            merge_commit_oid: None,
            files: Vec::new(),
            html_url: format!("https://github.com/test/repo/pull/{number}"),
            draft: request.draft,
        };
        state.pull_requests.push(StoredPullRequest {
            pr: pr.clone(),
            status: PullRequestStatus::Open,
        });
        Ok(pr)
    }

    async fn update_pull_request(
        &self,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let mut state = self.state.lock().unwrap();
        state.calls.update_pull_request.push(number);
        let stored = state.pull_request_mut(number)?;
        stored.pr.title = title.to_string();
        stored.pr.body = body.to_string();
        Ok(stored.pr.clone())
    }

    async fn reopen_pull_request(&self, number: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.reopen_pull_request.push(number);
        state.pull_request_mut(number)?.status = PullRequestStatus::Open;
        Ok(())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stored = state.pull_request_mut(number)?;
        for label in labels {
            if !stored.pr.labels.contains(label) {
                stored.pr.labels.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_remove_label {
            return Err(Error::from_api(ApiError::with_status(500, "boom", None)));
        }
        state.pull_request_mut(number)?.pr.labels.retain(|l| l != label);
        Ok(())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        self.state.lock().unwrap().calls.comments.push(CommentCall {
            number,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .request_reviewers
            .push((number, reviewers.to_vec()));
        Ok(())
    }

    async fn enable_auto_merge(&self, number: u64, merge_method: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .auto_merge
            .push((number, merge_method.to_string()));
        Ok(())
    }

    async fn create_release(&self, request: &ReleaseRequest) -> Result<GitHubRelease> {
        let mut state = self.state.lock().unwrap();
        state.calls.create_release.push(request.tag_name.clone());
        let exists = state.releases.iter().any(|r| r.tag_name == request.tag_name)
            || state.tags.iter().any(|t| t.name == request.tag_name);
        if exists {
            return Err(Error::DuplicateRelease {
                tag: request.tag_name.clone(),
                source: ApiError::with_status(
                    422,
                    "Validation Failed",
                    Some(r#"[{"resource":"Release","code":"already_exists","field":"tag_name"}]"#.to_string()),
                ),
            });
        }
        let release = GitHubRelease {
            id: Some(state.releases.len() as u64 + 1),
            name: Some(request.name.clone()),
            tag_name: request.tag_name.clone(),
            sha: request.sha.clone(),
            notes: Some(request.notes.clone()),
            url: format!(
                "https://github.com/test/repo/releases/tag/{}",
                request.tag_name
            ),
            draft: request.draft,
            prerelease: request.prerelease,
        };
        state.releases.insert(0, release.clone());
        state.tags.push(GitHubTag {
            name: request.tag_name.clone(),
            sha: request.sha.clone(),
        });
        Ok(release)
    }

    async fn release_by_tag(&self, tag: &str) -> Result<Option<GitHubRelease>> {
        let mut state = self.state.lock().unwrap();
        if state.hidden_release_lookups > 0 {
            state.hidden_release_lookups -= 1;
            return Ok(None);
        }
        Ok(state.releases.iter().find(|r| r.tag_name == tag).cloned())
    }
}
