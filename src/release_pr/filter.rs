//! Auto-merge filter
//!
//! Decides which release pull requests get auto-merge turned on. Pull
//! requests that do not pass still get created; they are sent to reviewers
//! instead.

use super::ReleasePullRequest;
use crate::commit::ConventionalCommit;
use crate::version::BumpKind;
use serde::Deserialize;

fn default_merge_method() -> String {
    "squash".to_string()
}

/// How the commit predicates combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Every commit must satisfy some predicate
    #[default]
    All,
    /// At least one commit must satisfy some predicate
    Any,
}

/// A `{type, scope}` predicate over conventional commits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitPredicate {
    /// Commit type, e.g. `fix`
    #[serde(rename = "type")]
    pub commit_type: String,
    /// Scope; any scope matches when absent
    pub scope: Option<String>,
}

impl CommitPredicate {
    fn matches(&self, commit: &ConventionalCommit) -> bool {
        commit.commit_type.as_deref() == Some(self.commit_type.as_str())
            && self
                .scope
                .as_ref()
                .is_none_or(|scope| commit.scope.as_ref() == Some(scope))
    }
}

/// `[auto_merge]` configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoMergeConfig {
    /// `squash`, `merge` or `rebase`
    #[serde(default = "default_merge_method")]
    pub merge_method: String,
    /// Allowed bump kinds; empty allows all
    #[serde(default)]
    pub version_bumps: Vec<BumpKind>,
    /// Commit predicates; empty allows all
    #[serde(default)]
    pub conventional_commits: Vec<CommitPredicate>,
    /// How `conventional_commits` combine
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl AutoMergeConfig {
    /// Whether `pr` qualifies for auto-merge
    pub fn matches(&self, pr: &ReleasePullRequest) -> bool {
        self.bumps_allowed(pr) && self.commits_allowed(pr)
    }

    fn bumps_allowed(&self, pr: &ReleasePullRequest) -> bool {
        if self.version_bumps.is_empty() {
            return true;
        }
        pr.releases.iter().all(|release| {
            release
                .bump_kind()
                .is_some_and(|kind| self.version_bumps.contains(&kind))
        })
    }

    fn commits_allowed(&self, pr: &ReleasePullRequest) -> bool {
        if self.conventional_commits.is_empty() {
            return true;
        }
        let mut commits = pr.releases.iter().flat_map(|r| r.commits.iter());
        let satisfied =
            |commit: &ConventionalCommit| self.conventional_commits.iter().any(|p| p.matches(commit));
        match self.match_mode {
            MatchMode::All => commits.all(satisfied),
            MatchMode::Any => commits.any(satisfied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release_pr::tests::{conventional, pull_request_with};
    use crate::version::Version;

    fn config(toml: &str) -> AutoMergeConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_defaults_match_everything() {
        let filter = config("");
        assert_eq!(filter.merge_method, "squash");
        let pr = pull_request_with(Version::new(1, 0, 0), Version::new(2, 0, 0), vec![conventional("feat!: x")]);
        assert!(filter.matches(&pr));
    }

    #[test]
    fn test_version_bump_filter() {
        let filter = config("version_bumps = [\"patch\"]");
        let patch = pull_request_with(Version::new(1, 0, 0), Version::new(1, 0, 1), vec![conventional("fix: x")]);
        let minor = pull_request_with(Version::new(1, 0, 0), Version::new(1, 1, 0), vec![conventional("feat: x")]);
        assert!(filter.matches(&patch));
        assert!(!filter.matches(&minor));
    }

    #[test]
    fn test_match_all_versus_any() {
        let commits = vec![conventional("fix(api): a"), conventional("feat(ui): b")];
        let all = config("conventional_commits = [{ type = \"fix\" }]");
        let any = config("match_mode = \"any\"\nconventional_commits = [{ type = \"fix\" }]");
        let pr = pull_request_with(Version::new(1, 0, 0), Version::new(1, 1, 0), commits);
        assert!(!all.matches(&pr));
        assert!(any.matches(&pr));
    }

    #[test]
    fn test_scope_predicate() {
        let filter = config("conventional_commits = [{ type = \"fix\", scope = \"deps\" }]");
        let good = pull_request_with(Version::new(1, 0, 0), Version::new(1, 0, 1), vec![conventional("fix(deps): bump")]);
        let bad = pull_request_with(Version::new(1, 0, 0), Version::new(1, 0, 1), vec![conventional("fix(api): x")]);
        assert!(filter.matches(&good));
        assert!(!filter.matches(&bad));
    }
}
