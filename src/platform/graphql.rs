//! GraphQL documents and response shapes for the GitHub service

use crate::types::PullRequest;
use serde::Deserialize;

/// Maximum files fetched inline per pull request
pub const MAX_FILES_PER_PULL_REQUEST: usize = 100;

pub const COMMITS_QUERY: &str = r"
query commitsForBranch($owner: String!, $repo: String!, $num: Int!, $maxFilesChanged: Int, $targetBranch: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    ref(qualifiedName: $targetBranch) {
      target {
        ... on Commit {
          history(first: $num, after: $cursor) {
            nodes {
              associatedPullRequests(first: 10) {
                nodes {
                  number
                  title
                  body
                  url
                  isDraft
                  baseRefName
                  headRefName
                  labels(first: 10) { nodes { name } }
                  mergeCommit { oid }
                  files(first: $maxFilesChanged) {
                    nodes { path }
                    pageInfo { hasNextPage }
                  }
                }
              }
              sha: oid
              message
            }
            pageInfo { hasNextPage endCursor }
          }
        }
      }
    }
  }
}";

pub const PULL_REQUESTS_QUERY: &str = r"
query pullRequestsForBranch($owner: String!, $repo: String!, $num: Int!, $maxFilesChanged: Int, $targetBranch: String!, $states: [PullRequestState!], $cursor: String) {
  repository(owner: $owner, name: $repo) {
    pullRequests(first: $num, after: $cursor, baseRefName: $targetBranch, states: $states, orderBy: {field: CREATED_AT, direction: DESC}) {
      nodes {
        number
        title
        body
        url
        isDraft
        baseRefName
        headRefName
        labels(first: 10) { nodes { name } }
        mergeCommit { oid }
        files(first: $maxFilesChanged) {
          nodes { path }
          pageInfo { hasNextPage }
        }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}";

pub const RELEASES_QUERY: &str = r"
query releases($owner: String!, $repo: String!, $num: Int!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    releases(first: $num, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
      nodes {
        databaseId
        name
        tagName
        tagCommit { oid }
        url
        description
        isDraft
        isPrerelease
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}";

pub const BRANCH_PROTECTION_QUERY: &str = r"
query branchProtectionRules($owner: String!, $repo: String!) {
  repository(owner: $owner, name: $repo) {
    id
    branchProtectionRules(first: 100) {
      nodes { id pattern lockBranch }
    }
  }
}";

pub const CREATE_BRANCH_PROTECTION_MUTATION: &str = r"
mutation createBranchProtectionRule($repositoryId: ID!, $pattern: String!, $lockBranch: Boolean!) {
  createBranchProtectionRule(input: { repositoryId: $repositoryId, pattern: $pattern, lockBranch: $lockBranch }) {
    branchProtectionRule { id pattern lockBranch }
  }
}";

pub const UPDATE_BRANCH_PROTECTION_MUTATION: &str = r"
mutation updateBranchProtectionRule($branchProtectionRuleId: ID!, $lockBranch: Boolean!) {
  updateBranchProtectionRule(input: { branchProtectionRuleId: $branchProtectionRuleId, lockBranch: $lockBranch }) {
    branchProtectionRule { id pattern lockBranch }
  }
}";

pub const ENABLE_AUTO_MERGE_MUTATION: &str = r"
mutation enableAutoMerge($pullRequestId: ID!, $mergeMethod: PullRequestMergeMethod!) {
  enablePullRequestAutoMerge(input: { pullRequestId: $pullRequestId, mergeMethod: $mergeMethod }) {
    pullRequest { number }
  }
}";

#[derive(Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    pub fn next_cursor(&self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor.clone()
        } else {
            None
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    pub page_info: PageInfo,
}

#[derive(Deserialize)]
pub struct Nodes<T> {
    pub nodes: Vec<T>,
}

#[derive(Deserialize)]
pub struct Oid {
    pub oid: String,
}

#[derive(Deserialize)]
pub struct LabelNode {
    pub name: String,
}

#[derive(Deserialize)]
pub struct FileNode {
    pub path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub nodes: Vec<FileNode>,
    pub page_info: PageInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_draft: bool,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub labels: Nodes<LabelNode>,
    pub merge_commit: Option<Oid>,
    pub files: Option<FilePage>,
}

impl PullRequestNode {
    /// Whether GitHub reported more files than the inline page holds
    pub fn files_truncated(&self) -> bool {
        self.files.as_ref().is_some_and(|f| f.page_info.has_next_page)
    }
}

impl From<PullRequestNode> for PullRequest {
    fn from(node: PullRequestNode) -> Self {
        Self {
            number: node.number,
            head_branch_name: node.head_ref_name,
            base_branch_name: node.base_ref_name,
            title: node.title,
            body: node.body,
            labels: node.labels.nodes.into_iter().map(|l| l.name).collect(),
            merge_commit_oid: node.merge_commit.map(|m| m.oid),
            files: node
                .files
                .map(|f| f.nodes.into_iter().map(|n| n.path).collect())
                .unwrap_or_default(),
            html_url: node.url,
            draft: node.is_draft,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub sha: String,
    pub message: String,
    pub associated_pull_requests: Nodes<PullRequestNode>,
}

#[derive(Deserialize)]
pub struct CommitTarget {
    pub history: Option<Connection<CommitNode>>,
}

#[derive(Deserialize)]
pub struct RefNode {
    pub target: Option<CommitTarget>,
}

#[derive(Deserialize)]
pub struct CommitRepository {
    #[serde(rename = "ref")]
    pub git_ref: Option<RefNode>,
}

#[derive(Deserialize)]
pub struct CommitsData {
    pub repository: Option<CommitRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRepository {
    pub pull_requests: Connection<PullRequestNode>,
}

#[derive(Deserialize)]
pub struct PullRequestsData {
    pub repository: Option<PullRequestRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseNode {
    pub database_id: Option<u64>,
    pub name: Option<String>,
    pub tag_name: String,
    pub tag_commit: Option<Oid>,
    #[serde(default)]
    pub url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_prerelease: bool,
}

#[derive(Deserialize)]
pub struct ReleaseRepository {
    pub releases: Connection<ReleaseNode>,
}

#[derive(Deserialize)]
pub struct ReleasesData {
    pub repository: Option<ReleaseRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionRuleNode {
    pub id: String,
    pub pattern: String,
    pub lock_branch: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionRepository {
    pub id: String,
    pub branch_protection_rules: Nodes<ProtectionRuleNode>,
}

#[derive(Deserialize)]
pub struct ProtectionData {
    pub repository: Option<ProtectionRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionRulePayload {
    pub branch_protection_rule: ProtectionRuleNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProtectionData {
    pub create_branch_protection_rule: ProtectionRulePayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProtectionData {
    pub update_branch_protection_rule: ProtectionRulePayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableAutoMergeData {
    #[allow(dead_code)]
    pub enable_pull_request_auto_merge: Option<serde_json::Value>,
}
