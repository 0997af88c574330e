//! GitHub platform service implementation
//!
//! Typed pull request, issue and release calls go through octocrab. History,
//! refs, git data and GraphQL go through raw reqwest calls so the HTTP status
//! of every failure is preserved on the error.

use super::graphql::{
    self, CommitNode, CommitsData, CreateProtectionData, EnableAutoMergeData, GraphQlResponse,
    ProtectionData, ProtectionRuleNode, PullRequestsData, ReleasesData, UpdateProtectionData,
};
use super::retry::{RetryPolicy, with_retry};
use super::{Page, PlatformService};
use crate::error::{ApiError, Error, Result};
use crate::types::{
    BranchProtection, Commit, CommitFileDetail, CompareStatus, ComparedCommit, Comparison,
    FileChange, GitHubRelease, GitHubTag, HistorySource, PlatformConfig, PullRequest,
    PullRequestRequest, PullRequestStatus, ReleaseRequest,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::try_join_all;
use octocrab::Octocrab;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Public GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub stops listing a commit's files at this count
const MAX_COMMIT_FILES: usize = 3000;

/// Prefix of REST page cursors, e.g. `page:3`
const REST_CURSOR_PREFIX: &str = "page:";

// REST response shapes

#[derive(Deserialize)]
struct RestLabel {
    name: String,
}

#[derive(Deserialize)]
struct RestRef {
    #[serde(rename = "ref")]
    ref_field: String,
}

#[derive(Deserialize)]
struct RestPullRequest {
    number: u64,
    title: String,
    body: Option<String>,
    #[serde(default)]
    html_url: String,
    draft: Option<bool>,
    #[serde(default)]
    labels: Vec<RestLabel>,
    head: RestRef,
    base: RestRef,
    merge_commit_sha: Option<String>,
    merged_at: Option<String>,
}

impl From<RestPullRequest> for PullRequest {
    fn from(pr: RestPullRequest) -> Self {
        Self {
            number: pr.number,
            head_branch_name: pr.head.ref_field,
            base_branch_name: pr.base.ref_field,
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
            merge_commit_oid: pr.merge_commit_sha,
            files: Vec::new(),
            html_url: pr.html_url,
            draft: pr.draft.unwrap_or(false),
        }
    }
}

#[derive(Deserialize)]
struct RestCommitMessage {
    message: String,
}

#[derive(Deserialize)]
struct RestCommit {
    sha: String,
    commit: RestCommitMessage,
}

#[derive(Deserialize)]
struct RestCommitWithFiles {
    #[serde(default)]
    files: Vec<CommitFileDetail>,
}

#[derive(Deserialize)]
struct RestRelease {
    id: u64,
    name: Option<String>,
    tag_name: String,
    body: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

#[derive(Deserialize)]
struct RestTagCommit {
    sha: String,
}

#[derive(Deserialize)]
struct RestTag {
    name: String,
    commit: RestTagCommit,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
    #[serde(rename = "type")]
    object_type: String,
}

#[derive(Deserialize)]
struct RestGitRef {
    object: RefObject,
}

#[derive(Deserialize)]
struct RestAnnotatedTag {
    object: RefObject,
}

#[derive(Deserialize)]
struct RestComparison {
    status: CompareStatus,
    #[serde(default)]
    commits: Vec<RestCommit>,
}

#[derive(Deserialize)]
struct RestContents {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
    sha: String,
}

#[derive(Deserialize)]
struct RestBlob {
    content: String,
}

#[derive(Deserialize)]
struct RestGitObject {
    sha: String,
}

#[derive(Deserialize)]
struct RestGitCommit {
    tree: RestGitObject,
}

#[derive(Deserialize)]
struct RestFile {
    filename: String,
}

/// GitHub service using octocrab and reqwest
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for raw requests
    http_client: Client,
    /// REST base, e.g. `https://api.github.com`
    api_url: String,
    /// GraphQL endpoint
    graphql_url: String,
    history_source: HistorySource,
    retry_policy: RetryPolicy,
}

impl GitHubService {
    /// Create a new GitHub service; `host` selects a GitHub Enterprise instance
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let (api_url, graphql_url) = match &host {
            Some(h) => (
                format!("https://{h}/api/v3"),
                format!("https://{h}/api/graphql"),
            ),
            None => (DEFAULT_API_URL.to_string(), format!("{DEFAULT_API_URL}/graphql")),
        };
        Self::build(token, PlatformConfig { owner, repo, host }, api_url, graphql_url)
    }

    /// Create a service against an explicit REST base URL; GraphQL lives at `{api_url}/graphql`
    pub fn with_api_url(token: &str, owner: String, repo: String, api_url: &str) -> Result<Self> {
        let api_url = api_url.trim_end_matches('/').to_string();
        let graphql_url = format!("{api_url}/graphql");
        Self::build(
            token,
            PlatformConfig {
                owner,
                repo,
                host: None,
            },
            api_url,
            graphql_url,
        )
    }

    fn build(
        token: &str,
        config: PlatformConfig,
        api_url: String,
        graphql_url: String,
    ) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(api_url.as_str())
            .map_err(Error::from)?
            .build()
            .map_err(Error::from)?;

        let http_client = Client::builder()
            .user_agent(concat!("release-manifest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::from)?;

        Ok(Self {
            client,
            config,
            token: token.to_string(),
            http_client,
            api_url,
            graphql_url,
            history_source: HistorySource::default(),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Choose GraphQL or REST for history listings
    #[must_use]
    pub fn with_history_source(mut self, source: HistorySource) -> Self {
        self.history_source = source;
        self
    }

    /// Override the backoff used on the query path
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{path}",
            self.api_url, self.config.owner, self.config.repo
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Send a request, turning any non-2xx response into an [`ApiError`]
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(ApiError::with_status(status.as_u16(), message, Some(body)).into())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.json().await?)
    }

    async fn send_json<T: DeserializeOwned>(&self, method: Method, url: &str, body: &Value) -> Result<T> {
        debug!(%method, url, "sending");
        let response = self.send(self.request(method, url).json(body)).await?;
        Ok(response.json().await?)
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let payload = json!({ "query": query, "variables": variables });
        let payload = &payload;
        with_retry(&self.retry_policy, move || self.graphql_once(payload)).await
    }

    async fn graphql_once<T: DeserializeOwned>(&self, payload: &Value) -> Result<T> {
        debug!(url = %self.graphql_url, "GraphQL request");
        let response = self
            .send(self.request(Method::POST, &self.graphql_url).json(payload))
            .await?;
        let response: GraphQlResponse<T> = response.json().await?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            let error_type = errors.iter().find_map(|e| e.error_type.clone());
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            let mut api = ApiError::new(format!("GraphQL error: {}", messages.join(", ")));
            if let Some(error_type) = error_type {
                api = api.typed(error_type);
            }
            return Err(api.into());
        }

        response
            .data
            .ok_or_else(|| ApiError::new("No data in GraphQL response").into())
    }

    // =========================================================================
    // History helpers
    // =========================================================================

    async fn commit_file_details(&self, sha: &str) -> Result<Vec<CommitFileDetail>> {
        let mut files = Vec::new();
        let mut page = 1;
        loop {
            let url = self.repo_url(&format!("/commits/{sha}?per_page=100&page={page}"));
            let commit: RestCommitWithFiles = self.get_json(&url).await?;
            let fetched = commit.files.len();
            files.extend(commit.files);
            if fetched < 100 {
                break;
            }
            if files.len() >= MAX_COMMIT_FILES {
                warn!(sha, count = files.len(), "commit file list truncated by GitHub");
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn commit_file_names(&self, sha: &str) -> Result<Vec<String>> {
        Ok(self
            .commit_file_details(sha)
            .await?
            .into_iter()
            .map(|f| f.filename)
            .collect())
    }

    async fn graphql_commit_page(
        &self,
        branch: &str,
        cursor: Option<&str>,
        per_page: usize,
        backfill_files: bool,
    ) -> Result<Page<Commit>> {
        let data: CommitsData = self
            .graphql(
                graphql::COMMITS_QUERY,
                json!({
                    "owner": self.config.owner,
                    "repo": self.config.repo,
                    "num": per_page,
                    "maxFilesChanged": graphql::MAX_FILES_PER_PULL_REQUEST,
                    "targetBranch": branch,
                    "cursor": cursor,
                }),
            )
            .await?;

        let Some(history) = data
            .repository
            .and_then(|r| r.git_ref)
            .and_then(|r| r.target)
            .and_then(|t| t.history)
        else {
            debug!(branch, "branch not found, no commits");
            return Ok(Page::empty());
        };

        let next_cursor = history.page_info.next_cursor();
        let mut needs_files = Vec::new();
        let mut commits = Vec::with_capacity(history.nodes.len());
        for node in history.nodes {
            let (commit, complete) = commit_from_node(node);
            if backfill_files && !complete {
                needs_files.push(commits.len());
            }
            commits.push(commit);
        }

        if !needs_files.is_empty() {
            debug!(count = needs_files.len(), "backfilling commit files");
            let files = try_join_all(
                needs_files
                    .iter()
                    .map(|&i| self.commit_file_names(&commits[i].sha)),
            )
            .await?;
            for (i, files) in needs_files.into_iter().zip(files) {
                commits[i].files = files;
            }
        }

        Ok(Page {
            items: commits,
            next_cursor,
        })
    }

    async fn rest_commit_page(
        &self,
        branch: &str,
        cursor: Option<&str>,
        per_page: usize,
        backfill_files: bool,
    ) -> Result<Page<Commit>> {
        let page = rest_page(cursor);
        let url = self.repo_url(&format!(
            "/commits?sha={}&per_page={per_page}&page={page}",
            urlencoding::encode(branch)
        ));
        let listed: Vec<RestCommit> = match self.get_json(&url).await {
            Ok(listed) => listed,
            // 404 unknown branch, 409 empty repository
            Err(e) if matches!(e.status(), Some(404 | 409 | 422)) => {
                debug!(branch, error = %e, "branch not listable, no commits");
                return Ok(Page::empty());
            }
            Err(e) => return Err(e),
        };
        let next_cursor = rest_next_cursor(listed.len(), per_page, page);

        let commits = try_join_all(listed.into_iter().map(|c| async move {
            let pulls: Vec<RestPullRequest> = self
                .get_json(&self.repo_url(&format!("/commits/{}/pulls", c.sha)))
                .await?;
            let pull_request = pulls
                .into_iter()
                .find(|pr| pr.merge_commit_sha.as_deref() == Some(c.sha.as_str()))
                .map(PullRequest::from);
            let files = if backfill_files {
                self.commit_file_names(&c.sha).await?
            } else {
                Vec::new()
            };
            Ok::<_, Error>(Commit {
                sha: c.sha,
                message: c.commit.message,
                files,
                pull_request,
            })
        }))
        .await?;

        Ok(Page {
            items: commits,
            next_cursor,
        })
    }

    async fn graphql_pull_request_page(
        &self,
        branch: &str,
        status: PullRequestStatus,
        cursor: Option<&str>,
        per_page: usize,
    ) -> Result<Page<PullRequest>> {
        let data: PullRequestsData = self
            .graphql(
                graphql::PULL_REQUESTS_QUERY,
                json!({
                    "owner": self.config.owner,
                    "repo": self.config.repo,
                    "num": per_page,
                    "maxFilesChanged": graphql::MAX_FILES_PER_PULL_REQUEST,
                    "targetBranch": branch,
                    "states": [status.to_string()],
                    "cursor": cursor,
                }),
            )
            .await?;

        let Some(repository) = data.repository else {
            return Ok(Page::empty());
        };
        let connection = repository.pull_requests;
        Ok(Page {
            next_cursor: connection.page_info.next_cursor(),
            items: connection.nodes.into_iter().map(PullRequest::from).collect(),
        })
    }

    async fn rest_pull_request_page(
        &self,
        branch: &str,
        status: PullRequestStatus,
        cursor: Option<&str>,
        per_page: usize,
        include_files: bool,
    ) -> Result<Page<PullRequest>> {
        let page = rest_page(cursor);
        let state = match status {
            PullRequestStatus::Open => "open",
            PullRequestStatus::Merged | PullRequestStatus::Closed => "closed",
        };
        let url = self.repo_url(&format!(
            "/pulls?base={}&state={state}&sort=created&direction=desc&per_page={per_page}&page={page}",
            urlencoding::encode(branch)
        ));
        let listed: Vec<RestPullRequest> = self.get_json(&url).await?;
        let next_cursor = rest_next_cursor(listed.len(), per_page, page);

        let matching = listed.into_iter().filter(|pr| match status {
            PullRequestStatus::Open => true,
            PullRequestStatus::Merged => pr.merged_at.is_some(),
            PullRequestStatus::Closed => pr.merged_at.is_none(),
        });

        let items = try_join_all(matching.map(|pr| async move {
            let mut pr = PullRequest::from(pr);
            if include_files {
                let url = self.repo_url(&format!("/pulls/{}/files?per_page=100", pr.number));
                let files: Vec<RestFile> = self.get_json(&url).await?;
                pr.files = files.into_iter().map(|f| f.filename).collect();
            }
            Ok::<_, Error>(pr)
        }))
        .await?;

        Ok(Page { items, next_cursor })
    }

    async fn graphql_release_page(
        &self,
        cursor: Option<&str>,
        per_page: usize,
    ) -> Result<Page<GitHubRelease>> {
        let data: ReleasesData = self
            .graphql(
                graphql::RELEASES_QUERY,
                json!({
                    "owner": self.config.owner,
                    "repo": self.config.repo,
                    "num": per_page,
                    "cursor": cursor,
                }),
            )
            .await?;

        let Some(repository) = data.repository else {
            return Ok(Page::empty());
        };
        let connection = repository.releases;
        let items = connection
            .nodes
            .into_iter()
            .map(|node| GitHubRelease {
                id: node.database_id,
                name: node.name,
                tag_name: node.tag_name,
                sha: node.tag_commit.map(|c| c.oid).unwrap_or_default(),
                notes: node.description,
                url: node.url,
                draft: node.is_draft,
                prerelease: node.is_prerelease,
            })
            .collect();
        Ok(Page {
            items,
            next_cursor: connection.page_info.next_cursor(),
        })
    }

    async fn rest_release_page(
        &self,
        cursor: Option<&str>,
        per_page: usize,
    ) -> Result<Page<GitHubRelease>> {
        let page = rest_page(cursor);
        let url = self.repo_url(&format!("/releases?per_page={per_page}&page={page}"));
        let listed: Vec<RestRelease> = self.get_json(&url).await?;
        let next_cursor = rest_next_cursor(listed.len(), per_page, page);

        let items = try_join_all(listed.into_iter().map(|release| async move {
            let sha = self.tag_commit_sha(&release.tag_name).await?.unwrap_or_default();
            Ok::<_, Error>(GitHubRelease {
                id: Some(release.id),
                name: release.name,
                tag_name: release.tag_name,
                sha,
                notes: release.body,
                url: release.html_url,
                draft: release.draft,
                prerelease: release.prerelease,
            })
        }))
        .await?;
        Ok(Page { items, next_cursor })
    }

    /// Commit a tag points at, dereferencing annotated tags
    async fn tag_commit_sha(&self, tag: &str) -> Result<Option<String>> {
        let url = self.repo_url(&format!("/git/ref/tags/{}", urlencoding::encode(tag)));
        let git_ref: RestGitRef = match self.get_json(&url).await {
            Ok(r) => r,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if git_ref.object.object_type == "tag" {
            let url = self.repo_url(&format!("/git/tags/{}", git_ref.object.sha));
            let annotated: RestAnnotatedTag = self.get_json(&url).await?;
            return Ok(Some(annotated.object.sha));
        }
        Ok(Some(git_ref.object.sha))
    }

    async fn protection_rules(&self) -> Result<(String, Vec<ProtectionRuleNode>)> {
        let data: ProtectionData = self
            .graphql(
                graphql::BRANCH_PROTECTION_QUERY,
                json!({ "owner": self.config.owner, "repo": self.config.repo }),
            )
            .await?;
        let repository = data.repository.ok_or_else(|| {
            Error::from(ApiError::new(format!(
                "repository {} not found",
                self.config.full_name()
            )))
        })?;
        Ok((repository.id, repository.branch_protection_rules.nodes))
    }
}

fn commit_from_node(node: CommitNode) -> (Commit, bool) {
    let sha = node.sha;
    let pr_node = node
        .associated_pull_requests
        .nodes
        .into_iter()
        .find(|pr| pr.merge_commit.as_ref().is_some_and(|m| m.oid == sha));
    let complete = pr_node.as_ref().is_some_and(|pr| !pr.files_truncated());
    let pull_request = pr_node.map(PullRequest::from);
    let files = pull_request
        .as_ref()
        .map(|pr| pr.files.clone())
        .unwrap_or_default();
    (
        Commit {
            sha,
            message: node.message,
            files,
            pull_request,
        },
        complete,
    )
}

fn rest_page(cursor: Option<&str>) -> u32 {
    cursor
        .and_then(|c| c.strip_prefix(REST_CURSOR_PREFIX))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

fn rest_next_cursor(fetched: usize, per_page: usize, page: u32) -> Option<String> {
    (fetched >= per_page && fetched > 0).then(|| format!("{REST_CURSOR_PREFIX}{}", page + 1))
}

fn is_rest_cursor(cursor: Option<&str>) -> bool {
    cursor.is_some_and(|c| c.starts_with(REST_CURSOR_PREFIX))
}

/// Helper to convert octocrab PR to our `PullRequest` type
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        head_branch_name: pr.head.ref_field.clone(),
        base_branch_name: pr.base.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        body: pr.body.as_deref().unwrap_or_default().to_string(),
        labels: pr
            .labels
            .as_ref()
            .map(|labels| labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default(),
        merge_commit_oid: pr.merge_commit_sha.clone(),
        files: Vec::new(),
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        draft: pr.draft.unwrap_or(false),
    }
}

fn release_from_octocrab(release: octocrab::models::repos::Release) -> GitHubRelease {
    GitHubRelease {
        id: Some(release.id.0),
        name: release.name,
        tag_name: release.tag_name,
        sha: release.target_commitish,
        notes: release.body,
        url: release.html_url.to_string(),
        draft: release.draft,
        prerelease: release.prerelease,
    }
}

fn protection_from_node(node: ProtectionRuleNode) -> BranchProtection {
    BranchProtection {
        id: node.id,
        pattern: node.pattern,
        lock_branch: node.lock_branch,
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn commit_page(
        &self,
        branch: &str,
        cursor: Option<&str>,
        per_page: usize,
        backfill_files: bool,
    ) -> Result<Page<Commit>> {
        debug!(branch, ?cursor, "fetching commit page");
        if self.history_source == HistorySource::Rest || is_rest_cursor(cursor) {
            self.rest_commit_page(branch, cursor, per_page, backfill_files)
                .await
        } else {
            self.graphql_commit_page(branch, cursor, per_page, backfill_files)
                .await
        }
    }

    async fn pull_request_page(
        &self,
        branch: &str,
        status: PullRequestStatus,
        cursor: Option<&str>,
        per_page: usize,
        include_files: bool,
    ) -> Result<Page<PullRequest>> {
        debug!(branch, %status, ?cursor, "fetching pull request page");
        if include_files && self.history_source == HistorySource::GraphQl && !is_rest_cursor(cursor)
        {
            self.graphql_pull_request_page(branch, status, cursor, per_page)
                .await
        } else {
            self.rest_pull_request_page(branch, status, cursor, per_page, include_files)
                .await
        }
    }

    async fn release_page(
        &self,
        cursor: Option<&str>,
        per_page: usize,
    ) -> Result<Page<GitHubRelease>> {
        debug!(?cursor, "fetching release page");
        if self.history_source == HistorySource::Rest || is_rest_cursor(cursor) {
            return self.rest_release_page(cursor, per_page).await;
        }
        match self.graphql_release_page(cursor, per_page).await {
            Err(e) if cursor.is_none() && !matches!(e, Error::Auth(_)) => {
                warn!(error = %e, "GraphQL release listing failed, falling back to REST");
                self.rest_release_page(None, per_page).await
            }
            result => result,
        }
    }

    async fn tag_page(&self, cursor: Option<&str>, per_page: usize) -> Result<Page<GitHubTag>> {
        let page = rest_page(cursor);
        debug!(page, "fetching tag page");
        let url = self.repo_url(&format!("/tags?per_page={per_page}&page={page}"));
        let listed: Vec<RestTag> = self.get_json(&url).await?;
        Ok(Page {
            next_cursor: rest_next_cursor(listed.len(), per_page, page),
            items: listed
                .into_iter()
                .map(|t| GitHubTag {
                    name: t.name,
                    sha: t.commit.sha,
                })
                .collect(),
        })
    }

    async fn commit_files(&self, sha: &str) -> Result<Vec<CommitFileDetail>> {
        self.commit_file_details(sha).await
    }

    async fn branch_sha(&self, branch: &str) -> Result<Option<String>> {
        let url = self.repo_url(&format!("/git/ref/heads/{}", urlencoding::encode(branch)));
        match self.get_json::<RestGitRef>(&url).await {
            Ok(git_ref) => Ok(Some(git_ref.object.sha)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        debug!(branch, sha, "creating branch");
        let _: Value = self
            .send_json(
                Method::POST,
                &self.repo_url("/git/refs"),
                &json!({ "ref": format!("refs/heads/{branch}"), "sha": sha }),
            )
            .await?;
        Ok(())
    }

    async fn update_branch(&self, branch: &str, sha: &str, force: bool) -> Result<()> {
        debug!(branch, sha, force, "updating branch");
        let url = self.repo_url(&format!("/git/refs/heads/{}", urlencoding::encode(branch)));
        let _: Value = self
            .send_json(Method::PATCH, &url, &json!({ "sha": sha, "force": force }))
            .await?;
        Ok(())
    }

    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison> {
        let url = self.repo_url(&format!(
            "/compare/{}...{}",
            urlencoding::encode(base),
            urlencoding::encode(head)
        ));
        let comparison: RestComparison = self.get_json(&url).await?;
        Ok(Comparison {
            status: comparison.status,
            commits: comparison
                .commits
                .into_iter()
                .map(|c| ComparedCommit {
                    sha: c.sha,
                    message: c.commit.message,
                })
                .collect(),
        })
    }

    async fn branch_protection(&self, branch: &str) -> Result<Option<BranchProtection>> {
        let (_, rules) = self.protection_rules().await?;
        Ok(rules
            .into_iter()
            .find(|rule| rule.pattern == branch)
            .map(protection_from_node))
    }

    async fn create_branch_protection(
        &self,
        branch: &str,
        lock_branch: bool,
    ) -> Result<BranchProtection> {
        let (repository_id, _) = self.protection_rules().await?;
        let data: CreateProtectionData = self
            .graphql(
                graphql::CREATE_BRANCH_PROTECTION_MUTATION,
                json!({
                    "repositoryId": repository_id,
                    "pattern": branch,
                    "lockBranch": lock_branch,
                }),
            )
            .await?;
        Ok(protection_from_node(
            data.create_branch_protection_rule.branch_protection_rule,
        ))
    }

    async fn update_branch_protection(
        &self,
        rule_id: &str,
        lock_branch: bool,
    ) -> Result<BranchProtection> {
        let data: UpdateProtectionData = self
            .graphql(
                graphql::UPDATE_BRANCH_PROTECTION_MUTATION,
                json!({ "branchProtectionRuleId": rule_id, "lockBranch": lock_branch }),
            )
            .await?;
        Ok(protection_from_node(
            data.update_branch_protection_rule.branch_protection_rule,
        ))
    }

    async fn file_contents(&self, path: &str, branch: &str) -> Result<String> {
        let url = self.repo_url(&format!(
            "/contents/{path}?ref={}",
            urlencoding::encode(branch)
        ));
        let contents: RestContents = match self.get_json(&url).await {
            Ok(c) => c,
            Err(e) if e.is_not_found() => {
                return Err(Error::FileNotFound {
                    path: path.to_string(),
                    branch: branch.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        // Files above 1MB come back without inline content
        let encoded = if contents.encoding == "base64" && !contents.content.is_empty() {
            contents.content
        } else {
            let blob: RestBlob = self
                .get_json(&self.repo_url(&format!("/git/blobs/{}", contents.sha)))
                .await?;
            blob.content
        };
        decode_base64(&encoded)
    }

    async fn push_files(
        &self,
        branch: &str,
        parent_sha: &str,
        message: &str,
        files: &[FileChange],
    ) -> Result<String> {
        debug!(branch, parent_sha, count = files.len(), "pushing files");
        let parent: RestGitCommit = self
            .get_json(&self.repo_url(&format!("/git/commits/{parent_sha}")))
            .await?;

        let tree_entries: Vec<Value> = files
            .iter()
            .map(|f| json!({ "path": f.path, "mode": "100644", "type": "blob", "content": f.content }))
            .collect();
        let tree: RestGitObject = self
            .send_json(
                Method::POST,
                &self.repo_url("/git/trees"),
                &json!({ "base_tree": parent.tree.sha, "tree": tree_entries }),
            )
            .await?;

        let commit: RestGitObject = self
            .send_json(
                Method::POST,
                &self.repo_url("/git/commits"),
                &json!({ "message": message, "tree": tree.sha, "parents": [parent_sha] }),
            )
            .await?;

        self.update_branch(branch, &commit.sha, true).await?;
        debug!(branch, sha = %commit.sha, "pushed files");
        Ok(commit.sha)
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        debug!(number, "getting PR");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await?;
        Ok(pr_from_octocrab(&pr))
    }

    async fn create_pull_request(&self, request: &PullRequestRequest) -> Result<PullRequest> {
        debug!(head = %request.head, base = %request.base, draft = request.draft, "creating PR");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .create(&request.title, &request.head, &request.base)
            .body(&request.body)
            .draft(request.draft)
            .send()
            .await?;
        let result = pr_from_octocrab(&pr);
        debug!(pr_number = result.number, "created PR");
        Ok(result)
    }

    async fn update_pull_request(&self, number: u64, title: &str, body: &str) -> Result<PullRequest> {
        debug!(number, "updating PR");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .update(number)
            .title(title)
            .body(body)
            .send()
            .await?;
        Ok(pr_from_octocrab(&pr))
    }

    async fn reopen_pull_request(&self, number: u64) -> Result<()> {
        debug!(number, "reopening PR");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .update(number)
            .state(octocrab::models::IssueState::Open)
            .send()
            .await?;
        Ok(())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        debug!(number, ?labels, "adding labels");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .add_labels(number, labels)
            .await?;
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        debug!(number, label, "removing label");
        match self
            .client
            .issues(&self.config.owner, &self.config.repo)
            .remove_label(number, label)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = Error::from(e);
                if err.is_not_found() {
                    debug!(number, label, "label was not present");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        debug!(number, "creating PR comment");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .create_comment(number, body)
            .await?;
        Ok(())
    }

    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<()> {
        if reviewers.is_empty() {
            return Ok(());
        }
        debug!(number, ?reviewers, "requesting reviewers");
        let _: Value = self
            .send_json(
                Method::POST,
                &self.repo_url(&format!("/pulls/{number}/requested_reviewers")),
                &json!({ "reviewers": reviewers }),
            )
            .await?;
        Ok(())
    }

    async fn enable_auto_merge(&self, number: u64, merge_method: &str) -> Result<()> {
        debug!(number, merge_method, "enabling auto-merge");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await?;
        let node_id = pr
            .node_id
            .ok_or_else(|| Error::from(ApiError::new("PR missing node_id for auto-merge")))?;
        let _: EnableAutoMergeData = self
            .graphql(
                graphql::ENABLE_AUTO_MERGE_MUTATION,
                json!({
                    "pullRequestId": node_id,
                    "mergeMethod": merge_method.to_uppercase(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn create_release(&self, request: &ReleaseRequest) -> Result<GitHubRelease> {
        debug!(tag = %request.tag_name, sha = %request.sha, "creating release");
        let result = self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .releases()
            .create(&request.tag_name)
            .target_commitish(&request.sha)
            .name(&request.name)
            .body(&request.notes)
            .draft(request.draft)
            .prerelease(request.prerelease)
            .send()
            .await;

        match result {
            Ok(release) => Ok(release_from_octocrab(release)),
            Err(e) => match Error::from(e) {
                Error::GitHubApi(api) if is_already_exists(&api) => Err(Error::DuplicateRelease {
                    tag: request.tag_name.clone(),
                    source: api,
                }),
                other => Err(other),
            },
        }
    }

    async fn release_by_tag(&self, tag: &str) -> Result<Option<GitHubRelease>> {
        match self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .releases()
            .get_by_tag(tag)
            .await
        {
            Ok(release) => Ok(Some(release_from_octocrab(release))),
            Err(e) => {
                let err = Error::from(e);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }
}

/// A 422 whose validation errors report `already_exists`
fn is_already_exists(api: &ApiError) -> bool {
    api.status == Some(422)
        && api
            .body
            .as_deref()
            .is_some_and(|body| body.contains("already_exists"))
}

fn decode_base64(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| Error::Internal(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("file is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_cursor_round_trip() {
        assert_eq!(rest_page(None), 1);
        assert_eq!(rest_page(Some("page:4")), 4);
        assert_eq!(rest_page(Some("Y3Vyc29y")), 1);
        assert_eq!(rest_next_cursor(25, 25, 1).as_deref(), Some("page:2"));
        assert_eq!(rest_next_cursor(3, 25, 1), None);
        assert!(is_rest_cursor(Some("page:2")));
        assert!(!is_rest_cursor(None));
    }

    #[test]
    fn test_decode_base64_ignores_line_breaks() {
        let encoded = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(decode_base64(encoded).unwrap(), "hello world");
    }

    #[test]
    fn test_already_exists_detection() {
        let body = r#"[{"resource":"Release","code":"already_exists","field":"tag_name"}]"#;
        let api = ApiError::with_status(422, "Validation Failed", Some(body.to_string()));
        assert!(is_already_exists(&api));

        let other = ApiError::with_status(422, "Validation Failed", Some("[]".to_string()));
        assert!(!is_already_exists(&other));
    }

    #[test]
    fn test_commit_prefers_pull_request_with_matching_merge_commit() {
        let node: CommitNode = serde_json::from_value(json!({
            "sha": "abc",
            "message": "fix: thing",
            "associatedPullRequests": { "nodes": [
                {
                    "number": 1, "title": "other", "baseRefName": "main", "headRefName": "x",
                    "labels": { "nodes": [] }, "mergeCommit": { "oid": "zzz" },
                    "files": { "nodes": [], "pageInfo": { "hasNextPage": false } }
                },
                {
                    "number": 2, "title": "fix: thing", "baseRefName": "main", "headRefName": "y",
                    "labels": { "nodes": [{ "name": "bug" }] }, "mergeCommit": { "oid": "abc" },
                    "files": { "nodes": [{ "path": "src/a.rs" }], "pageInfo": { "hasNextPage": true } }
                }
            ] }
        }))
        .unwrap();

        let (commit, complete) = commit_from_node(node);
        assert_eq!(commit.pull_request.as_ref().map(|p| p.number), Some(2));
        assert_eq!(commit.files, vec!["src/a.rs"]);
        assert!(!complete);
    }
}
