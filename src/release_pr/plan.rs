//! Release pull request planning - pure functions
//!
//! Everything here works on data gathered beforehand by
//! [`crate::manifest::Manifest`]. No I/O happens, so grouping, titles,
//! bodies and file updates can be unit tested directly.

use super::body::{PullRequestBody, ReleaseData};
use super::title::{DEFAULT_TITLE_PATTERN, PullRequestTitle};
use super::{Candidate, PlannedRelease, PullRequestGroup, ReleasePullRequest};
use crate::branch_name::BranchName;
use crate::changelog::{NotesContext, build_release_notes};
use crate::commit::parse_conventional_commits;
use crate::config::{ComponentConfig, ManifestConfig};
use crate::error::{Error, Result};
use crate::plugin::Plugin;
use crate::resolver::{ReleaseMarker, Resolution};
use crate::strategy::{Update, Updater};
use crate::tag::TagName;
use crate::types::Commit;
use crate::version::Version;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Inputs shared by every pull request in one planning pass
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    /// Manifest configuration
    pub config: &'a ManifestConfig,
    /// Every configured component, in path order
    pub components: &'a [ComponentConfig],
    /// Repository web URL for compare and commit links
    pub repo_url: String,
    /// Date written into release notes
    pub date: NaiveDate,
}

impl PlanContext<'_> {
    /// Branch commits are read from and head branches fork from
    pub fn source_branch(&self) -> &str {
        self.config
            .changes_branch
            .as_deref()
            .unwrap_or(&self.config.target_branch)
    }

    /// Every title pattern a release marker may have been rendered with
    pub fn marker_patterns(&self) -> Vec<String> {
        let mut patterns = vec![
            self.config
                .pull_request_title_pattern
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE_PATTERN.to_string()),
        ];
        for component in self.components {
            if let Some(pattern) = &component.pull_request_title_pattern
                && !patterns.contains(pattern)
            {
                patterns.push(pattern.clone());
            }
        }
        let group = PullRequestTitle::group(
            self.config.group_pull_request_title_pattern.as_deref(),
            &self.config.target_branch,
        );
        if !patterns.iter().any(|p| p == group.pattern()) {
            patterns.push(group.pattern().to_string());
        }
        patterns
    }

    fn component(&self, path: &str) -> Result<&ComponentConfig> {
        self.components
            .iter()
            .find(|c| c.path == path)
            .ok_or_else(|| Error::Internal(format!("unknown component path {path}")))
    }
}

/// Commits newer than `boundary` in a newest-first window.
///
/// Without a boundary, or when the boundary fell outside the window, the
/// whole window counts.
pub fn commits_since<'w>(window: &'w [Commit], boundary: Option<&str>) -> &'w [Commit] {
    boundary
        .and_then(|sha| window.iter().position(|c| c.sha == sha))
        .map_or(window, |index| &window[..index])
}

/// Build the candidate for one component from its resolution.
///
/// Release-marker commits never count towards a release, and only commits
/// touching the component's files (minus its exclusions and files of more
/// deeply nested packages in `component_paths`) are kept. Plugins see the
/// parsed commits before the next version is computed.
pub fn build_candidate(
    config: &ComponentConfig,
    component_paths: &[&str],
    resolution: &Resolution,
    window: &[Commit],
    markers: &[ReleaseMarker],
    plugins: &[Box<dyn Plugin>],
) -> Candidate {
    let marker_shas: HashSet<&str> = markers.iter().map(|m| m.sha.as_str()).collect();
    let relevant: Vec<Commit> = commits_since(window, resolution.boundary.as_deref())
        .iter()
        .filter(|c| !marker_shas.contains(c.sha.as_str()))
        .filter(|c| {
            if c.files.is_empty() {
                config.is_root()
            } else {
                c.files.iter().any(|f| config.owns_file(f, component_paths))
            }
        })
        .cloned()
        .collect();
    let commits = plugins
        .iter()
        .fold(parse_conventional_commits(&relevant), |commits, plugin| {
            plugin.process_commits(commits)
        });
    let current = resolution.version.clone();

    let version = match &config.release_as {
        Some(forced) if current.as_ref().is_none_or(|c| forced > c) => {
            debug!(path = %config.path, version = %forced, "release_as forces version");
            Some(forced.clone())
        }
        _ => config.versioning.next_version(current.as_ref(), &commits),
    };
    debug!(
        path = %config.path,
        commits = commits.len(),
        next = ?version.as_ref().map(ToString::to_string),
        "built candidate"
    );

    Candidate {
        group: Candidate::default_group(config),
        config: config.clone(),
        current,
        previous_tag: resolution.tag.clone(),
        commits,
        version,
    }
}

/// Group candidates into release pull requests.
///
/// Candidates without a version are dropped, and so are versions that would
/// not move the component forward.
pub fn plan_pull_requests(
    ctx: &PlanContext<'_>,
    candidates: Vec<Candidate>,
) -> Result<Vec<ReleasePullRequest>> {
    let mut groups: BTreeMap<PullRequestGroup, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        let Some(version) = &candidate.version else {
            continue;
        };
        if let Some(current) = &candidate.current
            && version <= current
        {
            warn!(
                path = %candidate.config.path,
                current = %current,
                proposed = %version,
                "proposed version does not advance, skipping"
            );
            continue;
        }
        groups
            .entry(candidate.group.clone())
            .or_default()
            .push(candidate);
    }

    groups
        .iter()
        .map(|(group, members)| build_pull_request(ctx, group, members))
        .collect()
}

/// Build one release pull request for a group of candidates.
///
/// Every candidate must carry a version.
pub fn build_pull_request(
    ctx: &PlanContext<'_>,
    group: &PullRequestGroup,
    candidates: &[Candidate],
) -> Result<ReleasePullRequest> {
    let config = ctx.config;
    let mut releases = Vec::with_capacity(candidates.len());
    let mut updates = Vec::new();
    let mut baseline = BTreeMap::new();

    for candidate in candidates {
        let component = &candidate.config;
        let version = candidate.version.clone().ok_or_else(|| {
            Error::Internal(format!("candidate {} has no version", component.path))
        })?;
        let new_tag = TagName::new(
            version.clone(),
            component.tag_component(),
            &component.tag_separator,
            component.include_v_in_tag,
        )
        .to_string();
        let notes = build_release_notes(
            &candidate.commits,
            &NotesContext {
                repo_url: &ctx.repo_url,
                previous_tag: candidate.previous_tag.as_deref(),
                new_tag: &new_tag,
                version: &version,
                date: ctx.date,
            },
        );
        updates.extend(component.release_type.build_updates(component, &version, &notes));
        baseline.insert(component.path.clone(), version.clone());
        releases.push(PlannedRelease {
            path: component.path.clone(),
            component: component.component.clone(),
            previous: candidate.current.clone(),
            previous_tag: candidate.previous_tag.clone(),
            version,
            commits: candidate.commits.clone(),
            notes,
        });
    }
    if releases.is_empty() {
        return Err(Error::Internal(format!("empty release group {group:?}")));
    }
    updates.push(Update {
        path: config.manifest_path.clone(),
        create_if_missing: true,
        updater: Updater::ManifestBaseline { versions: baseline },
    });

    let title = title_for(ctx, group, &releases);
    let body = PullRequestBody::new(
        config.pull_request_header.as_deref(),
        config.pull_request_footer.as_deref(),
        releases
            .iter()
            .map(|r| ReleaseData {
                component: r.component.clone(),
                version: r.version.clone(),
                notes: r.notes.clone(),
            })
            .collect(),
    );
    let branch_component = match group {
        PullRequestGroup::Combined => None,
        PullRequestGroup::Separate(name) | PullRequestGroup::Named(name) => Some(name.as_str()),
    };
    let head_branch = BranchName::new(
        &config.target_branch,
        config.changes_branch.as_deref(),
        branch_component,
    )?;

    Ok(ReleasePullRequest {
        title,
        body,
        head_branch,
        target_branch: config.target_branch.clone(),
        group: group.clone(),
        releases,
        updates,
        labels: vec![config.labels.pending.clone()],
        draft: config.draft_pull_request,
    })
}

fn title_for(
    ctx: &PlanContext<'_>,
    group: &PullRequestGroup,
    releases: &[PlannedRelease],
) -> PullRequestTitle {
    let config = ctx.config;
    let target = &config.target_branch;
    let pattern_of = |path: &str| {
        ctx.components
            .iter()
            .find(|c| c.path == path)
            .and_then(|c| c.pull_request_title_pattern.as_deref())
            .or(config.pull_request_title_pattern.as_deref())
    };
    match group {
        PullRequestGroup::Separate(_) => {
            let release = &releases[0];
            PullRequestTitle::single(
                pattern_of(&release.path),
                target,
                release.component.as_deref(),
                &release.version,
            )
        }
        PullRequestGroup::Named(name) => PullRequestTitle::single(
            config.pull_request_title_pattern.as_deref(),
            target,
            Some(name),
            &releases[0].version,
        ),
        PullRequestGroup::Combined => {
            let root = releases.iter().find(|r| r.path == crate::types::ROOT_PROJECT_PATH);
            match (ctx.components.len(), root) {
                (1, _) => PullRequestTitle::single(
                    pattern_of(&releases[0].path),
                    target,
                    None,
                    &releases[0].version,
                ),
                (_, Some(root)) => PullRequestTitle::single(
                    config.pull_request_title_pattern.as_deref(),
                    target,
                    None,
                    &root.version,
                ),
                _ => PullRequestTitle::group(
                    config.group_pull_request_title_pattern.as_deref(),
                    target,
                ),
            }
        }
    }
}

/// Rebuild `pr` with every release set to `version`.
///
/// Used when a human edited the version in the title of the open pull
/// request and marked it with the custom-version label.
pub fn with_custom_version(
    ctx: &PlanContext<'_>,
    pr: &ReleasePullRequest,
    version: &Version,
) -> Result<ReleasePullRequest> {
    let candidates = pr
        .releases
        .iter()
        .map(|release| {
            Ok(Candidate {
                config: ctx.component(&release.path)?.clone(),
                current: release.previous.clone(),
                previous_tag: release.previous_tag.clone(),
                commits: release.commits.clone(),
                version: Some(version.clone()),
                group: pr.group.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    build_pull_request(ctx, &pr.group, &candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::VersionSource;

    const TWO_PACKAGES: &str = r#"
[packages."path/a"]
release_type = "simple"
component = "pkg1"

[packages."path/b"]
release_type = "node"
component = "pkg2"
"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn commit(sha: &str, message: &str, files: &[&str]) -> Commit {
        Commit {
            sha: sha.to_string(),
            message: message.to_string(),
            files: files.iter().map(ToString::to_string).collect(),
            pull_request: None,
        }
    }

    fn released(version: &str, sha: &str) -> Resolution {
        Resolution {
            version: Some(version.parse().unwrap()),
            source: VersionSource::Release,
            tag: Some(format!("v{version}")),
            boundary: Some(sha.to_string()),
        }
    }

    fn plan(toml: &str, resolutions: &[Resolution], window: &[Commit]) -> Vec<ReleasePullRequest> {
        let config = ManifestConfig::parse(toml, "t").unwrap();
        let components = config.components("o/r").unwrap();
        let ctx = PlanContext {
            config: &config,
            components: &components,
            repo_url: "https://github.com/o/r".to_string(),
            date: date(),
        };
        let paths: Vec<&str> = components.iter().map(|c| c.path.as_str()).collect();
        let candidates = components
            .iter()
            .zip(resolutions)
            .map(|(c, r)| build_candidate(c, &paths, r, window, &[], &[]))
            .collect();
        plan_pull_requests(&ctx, candidates).unwrap()
    }

    #[test]
    fn test_commits_since_boundary() {
        let window = vec![commit("c", "fix: c", &[]), commit("b", "fix: b", &[]), commit("a", "x", &[])];
        assert_eq!(commits_since(&window, Some("b")).len(), 1);
        assert_eq!(commits_since(&window, Some("c")).len(), 0);
        assert_eq!(commits_since(&window, Some("zzz")).len(), 3);
        assert_eq!(commits_since(&window, None).len(), 3);
    }

    #[test]
    fn test_single_package_patch_release() {
        let window = vec![
            commit("s2", "fix: correct the widget", &["src/lib.rs"]),
            commit("s1", "chore: release 1.0.0", &["CHANGELOG.md"]),
        ];
        let prs = plan(
            "[packages.\".\"]\nrelease_type = \"simple\"\n",
            &[released("1.0.0", "s1")],
            &window,
        );
        assert_eq!(prs.len(), 1);
        let pr = &prs[0];
        assert_eq!(pr.title.to_string(), "chore(main): release 1.0.1");
        assert_eq!(pr.head_branch.to_string(), "release-please--branches--main");
        assert_eq!(pr.releases[0].version, Version::new(1, 0, 1));
        assert_eq!(pr.labels, vec!["autorelease: pending".to_string()]);
        let paths: Vec<_> = pr.updates.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["CHANGELOG.md", "version.txt", ".release-please-manifest.json"]
        );
        assert!(pr.body.render().contains("correct the widget"));
    }

    #[test]
    fn test_combined_pull_request_for_two_components() {
        let window = vec![
            commit("s3", "feat: new api", &["path/a/index.js"]),
            commit("s2", "fix: bug", &["path/b/index.js"]),
        ];
        let prs = plan(
            TWO_PACKAGES,
            &[released("1.0.0", "zz"), released("0.2.3", "zz")],
            &window,
        );
        assert_eq!(prs.len(), 1);
        let pr = &prs[0];
        assert_eq!(pr.title.to_string(), "chore: release main");
        assert_eq!(pr.head_branch.to_string(), "release-please--branches--main");
        let versions: Vec<_> = pr.releases.iter().map(|r| r.version.to_string()).collect();
        assert_eq!(versions, vec!["1.1.0", "0.2.4"]);
        assert!(pr.body.render().contains("<summary>pkg1: 1.1.0</summary>"));
    }

    #[test]
    fn test_separate_pull_requests_per_component() {
        let toml = format!("separate_pull_requests = true\n{TWO_PACKAGES}");
        let window = vec![
            commit("s3", "feat: new api", &["path/a/index.js"]),
            commit("s2", "fix: bug", &["path/b/index.js"]),
        ];
        let prs = plan(&toml, &[released("1.0.0", "zz"), released("0.2.3", "zz")], &window);
        let titles: Vec<_> = prs.iter().map(|p| p.title.to_string()).collect();
        assert_eq!(
            titles,
            vec!["chore(main): release pkg1 1.1.0", "chore(main): release pkg2 0.2.4"]
        );
        assert_eq!(
            prs[0].head_branch.to_string(),
            "release-please--branches--main--components--pkg1"
        );
    }

    #[test]
    fn test_sub_package_change_does_not_release_root() {
        let toml = "[packages.\".\"]\nrelease_type = \"simple\"\n\n[packages.\"path/a\"]\nrelease_type = \"simple\"\ncomponent = \"pkg1\"\n";
        let window = vec![commit("s1", "fix: only a", &["path/a/lib.rs"])];
        let prs = plan(toml, &[released("1.0.0", "zz"), released("0.2.3", "zz")], &window);
        assert_eq!(prs.len(), 1);
        let paths: Vec<_> = prs[0].releases.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["path/a"]);
        assert_eq!(prs[0].releases[0].version, Version::new(0, 2, 4));
    }

    #[test]
    fn test_non_releasable_commits_produce_nothing() {
        let window = vec![commit("s2", "chore: tidy", &["path/a/x"]), commit("s1", "docs: y", &["path/b/y"])];
        let prs = plan(TWO_PACKAGES, &[released("1.0.0", "zz"), released("0.2.3", "zz")], &window);
        assert!(prs.is_empty());
    }

    #[test]
    fn test_release_as_only_moves_forward() {
        let toml = "[packages.\".\"]\nrelease_type = \"simple\"\nrelease_as = \"2.0.0\"\n";
        let window = vec![commit("s1", "chore: nothing", &[])];
        let prs = plan(toml, &[released("1.4.0", "zz")], &window);
        assert_eq!(prs[0].releases[0].version, Version::new(2, 0, 0));

        let none = plan(toml, &[released("2.0.0", "zz")], &window);
        assert!(none.is_empty());
    }

    #[test]
    fn test_with_custom_version_rebuilds_updates() {
        let config = ManifestConfig::parse("[packages.\".\"]\nrelease_type = \"simple\"\n", "t").unwrap();
        let components = config.components("o/r").unwrap();
        let ctx = PlanContext {
            config: &config,
            components: &components,
            repo_url: "https://github.com/o/r".to_string(),
            date: date(),
        };
        let window = vec![commit("s1", "fix: x", &[])];
        let candidate = build_candidate(&components[0], &["."], &released("1.0.0", "zz"), &window, &[], &[]);
        let pr = plan_pull_requests(&ctx, vec![candidate]).unwrap().remove(0);

        let custom = with_custom_version(&ctx, &pr, &Version::new(3, 0, 0)).unwrap();
        assert_eq!(custom.title.to_string(), "chore(main): release 3.0.0");
        assert_eq!(custom.head_branch, pr.head_branch);
        assert!(custom.updates.iter().any(|u| u.updater
            == Updater::VersionTxt {
                version: Version::new(3, 0, 0)
            }));
    }
}
