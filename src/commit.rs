//! Conventional commit model
//!
//! Turns raw commits into typed entries used for version bumps and
//! release notes. A linked pull request can replace the commit message with
//! an override block in its body:
//!
//! ```text
//! BEGIN_COMMIT_OVERRIDE
//! feat: add a thing
//!
//! fix(api): repair another thing
//! END_COMMIT_OVERRIDE
//! ```

use crate::types::{Commit, PullRequest};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const OVERRIDE_BEGIN: &str = "BEGIN_COMMIT_OVERRIDE";
const OVERRIDE_END: &str = "END_COMMIT_OVERRIDE";

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z]+)(?:\((?P<scope>[^()]*)\))?(?P<bang>!)?:\s+(?P<subject>.+)$")
        .expect("valid header regex")
});

static BREAKING_FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^BREAKING[ -]CHANGE:\s*(?P<note>.+)$").expect("valid footer regex")
});

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(])#(?P<issue>\d+)\b").expect("valid reference regex"));

/// A note attached to a commit (only breaking-change notes are tracked)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNote {
    /// Note title, e.g. `BREAKING CHANGE`
    pub title: String,
    /// Note text
    pub text: String,
}

/// A commit enriched with conventional-commit fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionalCommit {
    /// Sha of the source commit
    pub sha: String,
    /// Effective message (the override text when one applies)
    pub message: String,
    /// Files touched by the source commit
    pub files: Vec<String>,
    /// Linked pull request
    pub pull_request: Option<PullRequest>,
    /// Commit type (`feat`, `fix`, ...); `None` for non-conventional messages
    pub commit_type: Option<String>,
    /// Scope in parentheses, if any
    pub scope: Option<String>,
    /// Whether the commit is a breaking change
    pub breaking: bool,
    /// Subject line without the type prefix
    pub bare_message: String,
    /// Breaking change notes
    pub notes: Vec<CommitNote>,
    /// Issue references (`#123`)
    pub references: Vec<u64>,
}

impl ConventionalCommit {
    /// Parse a single message attached to `commit`
    pub fn parse(commit: &Commit, message: &str) -> Self {
        let message = message.trim();
        let header = message.lines().next().unwrap_or_default().trim();

        let (commit_type, scope, bang, bare_message) = match HEADER_RE.captures(header) {
            Some(caps) => (
                Some(caps["type"].to_lowercase()),
                caps.name("scope")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty()),
                caps.name("bang").is_some(),
                caps["subject"].trim().to_string(),
            ),
            None => (None, None, false, header.to_string()),
        };

        let mut notes: Vec<CommitNote> = BREAKING_FOOTER_RE
            .captures_iter(message)
            .map(|caps| CommitNote {
                title: "BREAKING CHANGE".to_string(),
                text: caps["note"].trim().to_string(),
            })
            .collect();
        if bang && notes.is_empty() {
            notes.push(CommitNote {
                title: "BREAKING CHANGE".to_string(),
                text: bare_message.clone(),
            });
        }

        let references = REFERENCE_RE
            .captures_iter(message)
            .filter_map(|caps| caps["issue"].parse().ok())
            .collect();

        Self {
            sha: commit.sha.clone(),
            message: message.to_string(),
            files: commit.files.clone(),
            pull_request: commit.pull_request.clone(),
            commit_type,
            scope,
            breaking: !notes.is_empty(),
            bare_message,
            notes,
            references,
        }
    }

    /// Whether the commit can trigger a release on its own
    pub fn is_releasable(&self) -> bool {
        self.breaking
            || matches!(
                self.commit_type.as_deref(),
                Some("feat" | "fix" | "perf" | "revert" | "deps")
            )
    }

    /// Abbreviated sha for display
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

/// Extract the override block from a pull request body, if present.
///
/// Line endings are normalized to `\n`.
pub fn commit_override(body: &str) -> Option<String> {
    let body = body.replace("\r\n", "\n");
    let start = body.find(OVERRIDE_BEGIN)? + OVERRIDE_BEGIN.len();
    let end = body[start..].find(OVERRIDE_END)? + start;
    let text = body[start..end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parse raw commits, applying pull request override blocks.
///
/// An override may hold several messages separated by blank lines; each
/// becomes its own entry sharing the source commit's sha and files.
pub fn parse_conventional_commits(commits: &[Commit]) -> Vec<ConventionalCommit> {
    let mut parsed = Vec::with_capacity(commits.len());
    for commit in commits {
        let overridden = commit
            .pull_request
            .as_ref()
            .and_then(|pr| commit_override(&pr.body));
        match overridden {
            Some(text) => {
                parsed.extend(
                    text.split("\n\n")
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(|m| ConventionalCommit::parse(commit, m)),
                );
            }
            None => parsed.push(ConventionalCommit::parse(commit, &commit.message)),
        }
    }
    parsed
}
