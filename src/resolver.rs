//! Version resolver
//!
//! Finds each component's last released version and the commit that release
//! landed on. Evidence is considered in order: releases, then raw tags, then
//! the manifest baseline. Release-marker commits (the landing commits of
//! merged release pull requests) refine the boundary even when no release
//! object exists yet.

use crate::branch_name::BranchName;
use crate::config::ComponentConfig;
use crate::error::Result;
use crate::history::History;
use crate::release_pr::body::PullRequestBody;
use crate::release_pr::title::PullRequestTitle;
use crate::tag::TagName;
use crate::types::{Commit, GitHubRelease, GitHubTag};
use crate::version::Version;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Where a resolved version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// A platform release
    Release,
    /// A bare git tag
    Tag,
    /// The manifest baseline file
    Manifest,
    /// A merged release pull request that has not been tagged
    Marker,
    /// Nothing found
    Unreleased,
}

/// Outcome of resolving one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Last released version
    pub version: Option<Version>,
    /// Evidence the version came from
    pub source: VersionSource,
    /// Tag of that release, when one was found
    pub tag: Option<String>,
    /// Commit the release landed on; newer commits belong to the next release
    pub boundary: Option<String>,
}

impl Resolution {
    const fn unreleased() -> Self {
        Self {
            version: None,
            source: VersionSource::Unreleased,
            tag: None,
            boundary: None,
        }
    }
}

/// A landing commit of a merged release pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMarker {
    /// Commit sha
    pub sha: String,
    /// Position in the commit window (0 is newest)
    pub index: usize,
    /// Component or group the release covered; `None` for a combined release
    pub component: Option<String>,
    /// Version the title carried, if any
    pub version: Option<Version>,
    /// Per-component versions read from the landed pull request's body
    pub versions: BTreeMap<String, Version>,
}

/// Whether `commit` is the landing commit of a release pull request
pub fn release_marker(
    commit: &Commit,
    index: usize,
    target_branch: &str,
    patterns: &[String],
) -> Option<ReleaseMarker> {
    let subject = commit.message.lines().next().unwrap_or_default();
    let from_title = PullRequestTitle::parse_any(subject, patterns.iter().map(String::as_str))
        .or_else(|| {
            commit.pull_request.as_ref().and_then(|pr| {
                PullRequestTitle::parse_any(&pr.title, patterns.iter().map(String::as_str))
            })
        });
    let from_branch = commit
        .pull_request
        .as_ref()
        .and_then(|pr| pr.head_branch_name.parse::<BranchName>().ok())
        .filter(|branch| branch.target_branch() == target_branch);

    if from_title.is_none() && from_branch.is_none() {
        return None;
    }
    let component = from_branch
        .as_ref()
        .and_then(|b| b.component().map(str::to_string))
        .or_else(|| from_title.as_ref().and_then(|t| t.component.clone()));
    let versions: BTreeMap<String, Version> = commit
        .pull_request
        .as_ref()
        .and_then(|pr| PullRequestBody::parse(&pr.body))
        .map(|body| {
            body.releases
                .into_iter()
                .filter_map(|r| Some((r.component?, r.version)))
                .collect()
        })
        .unwrap_or_default();
    Some(ReleaseMarker {
        sha: commit.sha.clone(),
        index,
        component,
        version: from_title.and_then(|t| t.version),
        versions,
    })
}

/// Every release marker in a newest-first commit window
pub fn find_release_markers(
    window: &[Commit],
    target_branch: &str,
    patterns: &[String],
) -> Vec<ReleaseMarker> {
    window
        .iter()
        .enumerate()
        .filter_map(|(i, c)| release_marker(c, i, target_branch, patterns))
        .collect()
}

/// Inputs shared by every component resolution
pub struct ResolveInputs<'a> {
    /// Newest-first commit window
    pub window: &'a [Commit],
    /// Scanned releases
    pub releases: &'a [GitHubRelease],
    /// Scanned tags
    pub tags: &'a [GitHubTag],
    /// Manifest baseline
    pub baseline: &'a BTreeMap<String, Version>,
    /// Release markers found in the window
    pub markers: &'a [ReleaseMarker],
    /// Number of configured components
    pub component_count: usize,
}

/// Resolve one component from already gathered evidence
///
/// `aliases` are the names a marker may carry for this component: its own
/// name plus any group it is released in.
pub fn resolve_component(
    component: &ComponentConfig,
    aliases: &[String],
    inputs: &ResolveInputs<'_>,
) -> Resolution {
    let index: HashMap<&str, usize> = inputs
        .window
        .iter()
        .enumerate()
        .map(|(i, c)| (c.sha.as_str(), i))
        .collect();

    let matches_format = |tag: &str| {
        TagName::parse(tag).filter(|t| {
            t.matches_format(
                component.tag_component(),
                &component.tag_separator,
                component.include_v_in_tag,
            )
        })
    };

    // Highest recency wins; `min_by_key` keeps list order on ties
    let from_release = inputs
        .releases
        .iter()
        .filter_map(|r| {
            let tag = matches_format(&r.tag_name)?;
            let position = *index.get(r.sha.as_str())?;
            Some((position, tag, r.tag_name.clone(), r.sha.clone()))
        })
        .min_by_key(|(position, ..)| *position)
        .map(|found| (found, VersionSource::Release));

    let from_tag = || {
        inputs
            .tags
            .iter()
            .filter_map(|t| {
                let tag = matches_format(&t.name)?;
                let position = *index.get(t.sha.as_str())?;
                Some((position, tag, t.name.clone(), t.sha.clone()))
            })
            .min_by_key(|(position, ..)| *position)
            .map(|found| (found, VersionSource::Tag))
    };

    let mut resolution = match from_release.or_else(from_tag) {
        Some(((_, tag, tag_name, sha), source)) => Resolution {
            version: Some(tag.version),
            source,
            tag: Some(tag_name),
            boundary: Some(sha),
        },
        None => match inputs.baseline.get(&component.path) {
            Some(version) => Resolution {
                version: Some(version.clone()),
                source: VersionSource::Manifest,
                tag: None,
                boundary: None,
            },
            None => Resolution::unreleased(),
        },
    };

    let boundary_index = resolution
        .boundary
        .as_deref()
        .and_then(|sha| index.get(sha).copied());
    let marker = inputs
        .markers
        .iter()
        .filter(|m| marker_applies(m, component, aliases))
        .min_by_key(|m| m.index);
    if let Some(marker) = marker
        && boundary_index.is_none_or(|b| marker.index < b)
    {
        debug!(path = %component.path, sha = %marker.sha, "release marker is newer than release evidence");
        resolution.boundary = Some(marker.sha.clone());
        if let Some(version) = marker_version(marker, component, aliases, inputs.component_count)
            && resolution.version.as_ref().is_none_or(|v| version > v)
        {
            resolution.version = Some(version.clone());
            resolution.source = VersionSource::Marker;
        }
    }
    resolution
}

fn marker_applies(marker: &ReleaseMarker, component: &ComponentConfig, aliases: &[String]) -> bool {
    match &marker.component {
        Some(name) => aliases.contains(name),
        None => !component.separate_pull_requests || component.component.is_none(),
    }
}

/// Version a marker records for `component`.
///
/// A title without a component names the root package, or the only package
/// when there is just one. Other members of a combined release only take a
/// version from their own block in the landed body.
fn marker_version<'m>(
    marker: &'m ReleaseMarker,
    component: &ComponentConfig,
    aliases: &[String],
    component_count: usize,
) -> Option<&'m Version> {
    match &marker.component {
        Some(_) => marker.version.as_ref(),
        None if component.is_root() || component_count == 1 => marker.version.as_ref(),
        None => marker
            .versions
            .iter()
            .find(|(name, _)| aliases.contains(name))
            .map(|(_, version)| version),
    }
}

/// Gathers release and tag evidence and resolves every component
pub struct VersionResolver<'a> {
    history: History<'a>,
    release_search_depth: usize,
}

impl<'a> VersionResolver<'a> {
    /// Create a resolver scanning at most `release_search_depth` releases and tags
    pub fn new(history: History<'a>, release_search_depth: usize) -> Self {
        Self {
            history,
            release_search_depth,
        }
    }

    /// Resolve every component; `aliases` maps a path to its marker names
    pub async fn resolve(
        &self,
        components: &[ComponentConfig],
        aliases: &BTreeMap<String, Vec<String>>,
        window: &[Commit],
        baseline: &BTreeMap<String, Version>,
        markers: &[ReleaseMarker],
    ) -> Result<BTreeMap<String, Resolution>> {
        let releases = self
            .history
            .releases(Some(self.release_search_depth))
            .collect_all()
            .await?;
        debug!(count = releases.len(), "scanned releases");

        let no_aliases = Vec::new();
        let inputs = ResolveInputs {
            window,
            releases: &releases,
            tags: &[],
            baseline,
            markers,
            component_count: components.len(),
        };
        let mut resolved: BTreeMap<String, Resolution> = components
            .iter()
            .map(|c| {
                let aliases = aliases.get(&c.path).unwrap_or(&no_aliases);
                (c.path.clone(), resolve_component(c, aliases, &inputs))
            })
            .collect();

        // Tags are only listed when some component found no release
        let missing: Vec<&ComponentConfig> = components
            .iter()
            .filter(|c| {
                resolved
                    .get(&c.path)
                    .is_none_or(|r| !matches!(r.source, VersionSource::Release))
            })
            .collect();
        if !missing.is_empty() {
            let tags = self
                .history
                .tags(Some(self.release_search_depth))
                .collect_all()
                .await?;
            debug!(count = tags.len(), "scanned tags");
            let inputs = ResolveInputs {
                tags: &tags,
                ..inputs
            };
            for component in missing {
                let aliases = aliases.get(&component.path).unwrap_or(&no_aliases);
                resolved.insert(
                    component.path.clone(),
                    resolve_component(component, aliases, &inputs),
                );
            }
        }

        for (path, resolution) in &resolved {
            info!(
                path,
                version = ?resolution.version.as_ref().map(ToString::to_string),
                source = ?resolution.source,
                "resolved current version"
            );
        }
        Ok(resolved)
    }
}
