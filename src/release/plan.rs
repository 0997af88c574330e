//! Release planning - pure functions
//!
//! Turns a merged release pull request back into the releases it promised,
//! using the parsed body to recover each component's version and notes.

use crate::branch_name::BranchName;
use crate::config::{ComponentConfig, ManifestConfig, PluginConfig};
use crate::labels::{ReleasePhase, ReleaseLabels};
use crate::release_pr::body::{PullRequestBody, ReleaseData};
use crate::tag::TagName;
use crate::types::{PullRequest, ReleaseRequest};
use crate::version::Version;
use tracing::warn;

/// One release to create from a merged pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRelease {
    /// Component path
    pub path: String,
    /// Component name
    pub component: Option<String>,
    /// Released version
    pub version: Version,
    /// Tag to create
    pub tag: String,
    /// Commit the tag points at
    pub sha: String,
    /// Release name
    pub name: String,
    /// Release notes
    pub notes: String,
    /// Create as draft
    pub draft: bool,
    /// Mark as prerelease
    pub prerelease: bool,
}

impl CandidateRelease {
    /// The platform request for this release
    pub fn request(&self) -> ReleaseRequest {
        ReleaseRequest {
            tag_name: self.tag.clone(),
            sha: self.sha.clone(),
            name: self.name.clone(),
            notes: self.notes.clone(),
            draft: self.draft,
            prerelease: self.prerelease,
        }
    }
}

/// A merged release pull request with the releases it should produce
#[derive(Debug, Clone)]
pub struct MergedReleasePullRequest {
    /// The merged pull request
    pub pull_request: PullRequest,
    /// Releases in component path order
    pub releases: Vec<CandidateRelease>,
}

/// Whether a merged pull request is a release pull request still awaiting tags
pub fn is_pending_release(pr: &PullRequest, target_branch: &str, labels: &ReleaseLabels) -> bool {
    ReleasePhase::from_labels(&pr.labels, labels) == ReleasePhase::Pending
        && pr
            .head_branch_name
            .parse::<BranchName>()
            .is_ok_and(|branch| branch.target_branch() == target_branch)
}

/// Map a merged pull request's body to the releases it promised.
///
/// `components` must already carry plugin preconfiguration. A pull request
/// without a merge commit yields no releases.
pub fn plan_releases(
    config: &ManifestConfig,
    components: &[ComponentConfig],
    pr: &PullRequest,
    body: &PullRequestBody,
) -> MergedReleasePullRequest {
    let mut planned = MergedReleasePullRequest {
        pull_request: pr.clone(),
        releases: Vec::new(),
    };
    let Some(sha) = pr.merge_commit_oid.as_deref() else {
        warn!(pr_number = pr.number, "merged pull request has no merge commit");
        return planned;
    };
    let branch_component = pr
        .head_branch_name
        .parse::<BranchName>()
        .ok()
        .and_then(|b| b.component().map(str::to_string));
    let eligible = eligible_components(config, components, branch_component.as_deref());

    for data in &body.releases {
        let Some(component) = match_component(components, &eligible, pr, data) else {
            warn!(
                pr_number = pr.number,
                component = ?data.component,
                version = %data.version,
                "no configured component matches release notes"
            );
            continue;
        };
        if component.skip_github_release {
            continue;
        }
        let tag = TagName::new(
            data.version.clone(),
            component.tag_component(),
            &component.tag_separator,
            component.include_v_in_tag,
        )
        .to_string();
        let name = match &component.component {
            Some(c) => format!("{c}: v{}", data.version),
            None => format!("v{}", data.version),
        };
        let prerelease = config.labels.has_prerelease(&pr.labels)
            || component.prerelease == Some(true)
            || data.version.is_prerelease();
        planned.releases.push(CandidateRelease {
            path: component.path.clone(),
            component: component.component.clone(),
            version: data.version.clone(),
            tag,
            sha: sha.to_string(),
            name,
            notes: data.notes.clone(),
            draft: component.draft,
            prerelease,
        });
    }
    planned.releases.sort_by(|a, b| a.path.cmp(&b.path));
    planned
}

/// Components a pull request on this head branch may release
fn eligible_components<'c>(
    config: &ManifestConfig,
    components: &'c [ComponentConfig],
    branch_component: Option<&str>,
) -> Vec<&'c ComponentConfig> {
    let Some(name) = branch_component else {
        return components
            .iter()
            .filter(|c| !c.separate_pull_requests)
            .collect();
    };
    let linked: Vec<&String> = config
        .plugins
        .iter()
        .filter_map(|plugin| match plugin {
            PluginConfig::LinkedVersions {
                group_name,
                components,
            } if group_name == name => Some(components),
            _ => None,
        })
        .flatten()
        .collect();
    components
        .iter()
        .filter(|c| {
            c.path == name
                || c.component.as_deref().is_some_and(|own| own == name || linked.iter().any(|l| *l == own))
        })
        .collect()
}

fn match_component<'c>(
    components: &'c [ComponentConfig],
    eligible: &[&'c ComponentConfig],
    pr: &PullRequest,
    data: &ReleaseData,
) -> Option<&'c ComponentConfig> {
    if let Some(name) = &data.component {
        return components
            .iter()
            .find(|c| c.component.as_ref() == Some(name));
    }
    if let [only] = eligible {
        return Some(only);
    }
    // An unnamed single release: pick the deepest component the pull request touched
    eligible
        .iter()
        .filter(|c| !c.is_root() && pr.files.iter().any(|f| c.owns_file(f, &[])))
        .max_by_key(|c| c.path.len())
        .or_else(|| eligible.iter().find(|c| c.is_root()))
        .copied()
}
