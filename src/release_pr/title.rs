//! Pull request titles built from, and parsed back through, a pattern
//!
//! Patterns use the tokens `${scope}`, `${component}`, `${version}` and
//! `${branch}`. Every rendered title must parse back with the same pattern;
//! the custom-version label and release-marker detection depend on it.

use crate::error::{Error, Result};
use crate::version::Version;
use regex::Regex;
use std::fmt;

/// Title of a release pull request for one component
pub const DEFAULT_TITLE_PATTERN: &str = "chore${scope}: release${component} ${version}";

/// Title of a combined release pull request
pub const DEFAULT_GROUP_TITLE_PATTERN: &str = "chore${scope}: release ${branch}";

/// A structured release pull request title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestTitle {
    pattern: String,
    /// Branch rendered into `${scope}`, when the pattern carries it
    pub scope: Option<String>,
    /// Branch rendered into `${branch}`
    pub branch: Option<String>,
    /// Component name, if any
    pub component: Option<String>,
    /// Version, if the pattern carries one
    pub version: Option<Version>,
}

impl PullRequestTitle {
    /// Title for one component (or one version shared by a group)
    pub fn single(
        pattern: Option<&str>,
        target_branch: &str,
        component: Option<&str>,
        version: &Version,
    ) -> Self {
        Self {
            pattern: pattern.unwrap_or(DEFAULT_TITLE_PATTERN).to_string(),
            scope: Some(target_branch.to_string()),
            branch: Some(target_branch.to_string()),
            component: component.filter(|c| !c.is_empty()).map(str::to_string),
            version: Some(version.clone()),
        }
    }

    /// Title for several components released together
    pub fn group(pattern: Option<&str>, target_branch: &str) -> Self {
        Self {
            pattern: pattern.unwrap_or(DEFAULT_GROUP_TITLE_PATTERN).to_string(),
            scope: None,
            branch: Some(target_branch.to_string()),
            component: None,
            version: None,
        }
    }

    /// The pattern this title renders with
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parse `title` with `pattern`; `None` when it does not match
    pub fn parse(title: &str, pattern: &str) -> Option<Self> {
        let re = pattern_regex(pattern).ok()?;
        let caps = re.captures(title.trim())?;
        let version = match caps.name("version") {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        Some(Self {
            pattern: pattern.to_string(),
            scope: caps.name("scope").map(|m| m.as_str().to_string()),
            branch: caps.name("branch").map(|m| m.as_str().to_string()),
            component: caps.name("component").map(|m| m.as_str().to_string()),
            version,
        })
    }

    /// Parse `title` with the first of `patterns` that matches
    pub fn parse_any<'p>(title: &str, patterns: impl IntoIterator<Item = &'p str>) -> Option<Self> {
        patterns
            .into_iter()
            .find_map(|pattern| Self::parse(title, pattern))
    }
}

impl fmt::Display for PullRequestTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self
            .scope
            .as_deref()
            .map(|s| format!("({s})"))
            .unwrap_or_default();
        let component = self
            .component
            .as_deref()
            .map(|c| format!(" {c}"))
            .unwrap_or_default();
        let version = self
            .version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let title = self
            .pattern
            .replace("${scope}", &scope)
            .replace("${component}", &component)
            .replace("${version}", &version)
            .replace("${branch}", self.branch.as_deref().unwrap_or_default());
        write!(f, "{}", title.trim())
    }
}

/// Compile a title pattern into a matcher
pub fn pattern_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::from("^");
    let mut rest = pattern;
    while let Some(start) = rest.find("${") {
        out.push_str(&regex::escape(&rest[..start]));
        let Some(end) = rest[start..].find('}') else {
            return Err(Error::Internal(format!("unterminated token in title pattern {pattern:?}")));
        };
        let token = &rest[start + 2..start + end];
        out.push_str(match token {
            "scope" => r"(?:\((?P<scope>[\w./-]+)\))?",
            "component" => r"(?: (?P<component>[^\s]+))?",
            "version" => r"v?(?P<version>\d+\.\d+\.\d+[^\s]*)",
            "branch" => r"(?P<branch>[\w./-]+)",
            other => {
                return Err(Error::Internal(format!(
                    "unknown token ${{{other}}} in title pattern {pattern:?}"
                )));
            }
        });
        rest = &rest[start + end + 1..];
    }
    out.push_str(&regex::escape(rest));
    // Squash merges append the pull request number
    out.push_str(r"(?: \(#\d+\))?$");
    Regex::new(&out).map_err(|e| Error::Internal(format!("invalid title pattern {pattern:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_single_title() {
        let title = PullRequestTitle::single(None, "main", None, &Version::new(1, 0, 1));
        assert_eq!(title.to_string(), "chore(main): release 1.0.1");

        let parsed = PullRequestTitle::parse("chore(main): release 1.0.1", DEFAULT_TITLE_PATTERN)
            .unwrap();
        assert_eq!(parsed.component, None);
        assert_eq!(parsed.scope.as_deref(), Some("main"));
        assert_eq!(parsed.version, Some(Version::new(1, 0, 1)));

        let squashed =
            PullRequestTitle::parse("chore(main): release 1.0.1 (#42)", DEFAULT_TITLE_PATTERN).unwrap();
        assert_eq!(squashed.version, Some(Version::new(1, 0, 1)));
    }

    #[test]
    fn test_component_title_round_trip() {
        let title = PullRequestTitle::single(None, "main", Some("pkg1"), &Version::new(2, 0, 0));
        let rendered = title.to_string();
        assert_eq!(rendered, "chore(main): release pkg1 2.0.0");
        let parsed = PullRequestTitle::parse(&rendered, DEFAULT_TITLE_PATTERN).unwrap();
        assert_eq!(parsed.component, title.component);
        assert_eq!(parsed.version, title.version);
        assert_eq!(parsed.to_string(), rendered);
    }

    #[test]
    fn test_group_title() {
        let title = PullRequestTitle::group(None, "main");
        assert_eq!(title.to_string(), "chore: release main");
        let parsed = PullRequestTitle::parse("chore: release main", DEFAULT_GROUP_TITLE_PATTERN)
            .unwrap();
        assert_eq!(parsed.branch.as_deref(), Some("main"));
        assert_eq!(parsed.version, None);
    }

    #[test]
    fn test_custom_pattern_with_prerelease_version() {
        let pattern = "release: ${component} v${version}";
        let parsed = PullRequestTitle::parse("release: api v3.1.0-beta.2", pattern).unwrap();
        assert_eq!(parsed.component.as_deref(), Some("api"));
        assert_eq!(parsed.version.unwrap().to_string(), "3.1.0-beta.2");
    }

    #[test]
    fn test_non_matching_titles() {
        assert!(PullRequestTitle::parse("fix: a bug", DEFAULT_TITLE_PATTERN).is_none());
        assert!(PullRequestTitle::parse("chore(main): release banana", DEFAULT_TITLE_PATTERN).is_none());
        assert!(pattern_regex("release ${nope}").is_err());
    }
}
