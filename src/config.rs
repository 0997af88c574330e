//! Manifest configuration
//!
//! Loaded from `release-manifest.toml`:
//!
//! ```toml
//! target_branch = "main"
//! separate_pull_requests = false
//!
//! [packages."."]
//! release_type = "simple"
//!
//! [packages."crates/core"]
//! release_type = "rust"
//! component = "core"
//! ```

use crate::error::{Error, Result};
use crate::labels::ReleaseLabels;
use crate::release_pr::filter::AutoMergeConfig;
use crate::strategy::ReleaseType;
use crate::tag::DEFAULT_TAG_SEPARATOR;
use crate::types::{HistorySource, ROOT_PROJECT_PATH};
use crate::version::Version;
use crate::versioning::VersioningStrategy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "release-manifest.toml";

/// Default manifest baseline path in the target repository
pub const DEFAULT_MANIFEST_PATH: &str = ".release-please-manifest.json";

const fn default_release_search_depth() -> usize {
    400
}

const fn default_commit_search_depth() -> usize {
    500
}

fn default_target_branch() -> String {
    "main".to_string()
}

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

/// Built-in plugins
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PluginConfig {
    /// Release the listed components together with one shared version
    LinkedVersions {
        /// Name used for the shared pull request
        group_name: String,
        /// Component names to link
        components: Vec<String>,
    },
    /// Capitalize the first letter of commit subjects in release notes
    SentenceCase,
}

/// Per-package settings as written in the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Release type (selects the file updaters)
    pub release_type: Option<ReleaseType>,
    /// Component name used in tags, branch names and titles
    pub component: Option<String>,
    /// Package name reported by the strategy
    pub package_name: Option<String>,
    /// Prefix tags with the component name
    pub include_component_in_tag: Option<bool>,
    /// Prefix versions in tags with `v`
    pub include_v_in_tag: Option<bool>,
    /// Separator between component and version in tags
    pub tag_separator: Option<String>,
    /// Give this package its own pull request
    pub separate_pull_requests: Option<bool>,
    /// Create releases as drafts
    pub draft: Option<bool>,
    /// Force releases to be prereleases
    pub prerelease: Option<bool>,
    /// Do not create GitHub releases for this package
    pub skip_github_release: Option<bool>,
    /// Do not update a changelog file
    pub skip_changelog: Option<bool>,
    /// Changelog path relative to the package
    pub changelog_path: Option<String>,
    /// Versioning strategy
    pub versioning: Option<VersioningStrategy>,
    /// Extra files carrying `x-release-please-version` markers
    pub extra_files: Option<Vec<String>>,
    /// Paths whose changes do not count for this package
    pub exclude_paths: Option<Vec<String>>,
    /// Force the next version
    pub release_as: Option<String>,
    /// Title pattern override
    pub pull_request_title_pattern: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestConfig {
    /// Branch release pull requests target
    #[serde(default = "default_target_branch")]
    pub target_branch: String,
    /// Branch updates are authored against, when different from target
    #[serde(default)]
    pub changes_branch: Option<String>,
    /// One pull request per component instead of a combined one
    #[serde(default)]
    pub separate_pull_requests: bool,
    /// Create releases as drafts
    #[serde(default)]
    pub draft: bool,
    /// Open release pull requests as drafts
    #[serde(default)]
    pub draft_pull_request: bool,
    /// Force releases to be prereleases
    #[serde(default)]
    pub prerelease: Option<bool>,
    /// Lifecycle label names
    #[serde(default)]
    pub labels: ReleaseLabels,
    /// Title pattern for single-component pull requests
    #[serde(default)]
    pub pull_request_title_pattern: Option<String>,
    /// Title pattern for combined pull requests
    #[serde(default)]
    pub group_pull_request_title_pattern: Option<String>,
    /// Text before the release notes in the body
    #[serde(default)]
    pub pull_request_header: Option<String>,
    /// Text after the release notes in the body
    #[serde(default)]
    pub pull_request_footer: Option<String>,
    /// How many releases to scan when resolving versions
    #[serde(default = "default_release_search_depth")]
    pub release_search_depth: usize,
    /// How many commits to scan
    #[serde(default = "default_commit_search_depth")]
    pub commit_search_depth: usize,
    /// Manifest baseline file in the repository
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    /// Auto-merge policy
    #[serde(default)]
    pub auto_merge: Option<AutoMergeConfig>,
    /// Reviewers requested on pull requests that are not auto-merged
    #[serde(default)]
    pub reviewers: Vec<String>,
    /// Plugins, applied in order
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    /// History transport
    #[serde(default)]
    pub history_source: HistorySource,
    /// Packages by repository-relative path
    #[serde(default)]
    pub packages: BTreeMap<String, PackageConfig>,
}

/// Fully resolved settings for one component
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ComponentConfig {
    /// Repository-relative path (`.` for the root)
    pub path: String,
    /// Release type
    pub release_type: ReleaseType,
    /// Component name, if any
    pub component: Option<String>,
    /// Package name
    pub package_name: Option<String>,
    /// Prefix tags with the component name
    pub include_component_in_tag: bool,
    /// Prefix versions in tags with `v`
    pub include_v_in_tag: bool,
    /// Separator between component and version in tags
    pub tag_separator: String,
    /// Own pull request
    pub separate_pull_requests: bool,
    /// Draft releases
    pub draft: bool,
    /// Forced prerelease, when configured
    pub prerelease: Option<bool>,
    /// Skip GitHub release creation
    pub skip_github_release: bool,
    /// Skip changelog updates
    pub skip_changelog: bool,
    /// Changelog path relative to the component
    pub changelog_path: String,
    /// Versioning strategy
    pub versioning: VersioningStrategy,
    /// Extra files with version markers
    pub extra_files: Vec<String>,
    /// Excluded paths (repository-relative)
    pub exclude_paths: Vec<String>,
    /// Forced next version
    pub release_as: Option<Version>,
    /// Title pattern override
    pub pull_request_title_pattern: Option<String>,
}

impl ComponentConfig {
    /// Whether this is the repository root component
    pub fn is_root(&self) -> bool {
        self.path == ROOT_PROJECT_PATH
    }

    /// Component prefix used in tags, or `None` when tags are bare
    pub fn tag_component(&self) -> Option<&str> {
        if self.include_component_in_tag {
            self.component.as_deref()
        } else {
            None
        }
    }

    /// Join a component-relative path onto the component path
    pub fn join(&self, relative: &str) -> String {
        if self.is_root() {
            relative.to_string()
        } else {
            format!("{}/{relative}", self.path.trim_end_matches('/'))
        }
    }

    /// Whether a repository file counts towards this component.
    ///
    /// A file belongs to the most specific of `component_paths` containing
    /// it, so the root only owns files outside every other package.
    pub fn owns_file(&self, file: &str, component_paths: &[&str]) -> bool {
        let nested = component_paths
            .iter()
            .any(|other| other.len() > self.path.len() && path_contains(other, file));
        path_contains(&self.path, file)
            && !nested
            && !self.exclude_paths.iter().any(|excluded| {
                let excluded = excluded.trim_end_matches('/');
                file == excluded || file.starts_with(&format!("{excluded}/"))
            })
    }
}

impl ManifestConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(
                path.display().to_string(),
                "-",
                format!("failed to read configuration: {e}"),
            )
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse configuration text; `source` names the file in errors
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config(source, "-", format!("invalid configuration: {e}")))?;
        if config.packages.is_empty() {
            return Err(Error::config(source, "-", "no packages configured"));
        }
        Ok(config)
    }

    /// Resolve every package into a [`ComponentConfig`], in path order
    pub fn components(&self, repo: &str) -> Result<Vec<ComponentConfig>> {
        let mut components = self
            .packages
            .iter()
            .map(|(path, package)| self.resolve_component(path, package, repo))
            .collect::<Result<Vec<_>>>()?;
        components.sort_by(|a, b| a.path.cmp(&b.path));
        if let Some(pair) = components.windows(2).find(|w| w[0].path == w[1].path) {
            return Err(Error::config(
                &pair[0].path,
                repo,
                "package path configured more than once",
            ));
        }
        Ok(components)
    }

    fn resolve_component(
        &self,
        path: &str,
        package: &PackageConfig,
        repo: &str,
    ) -> Result<ComponentConfig> {
        let path = normalize_path(path);
        let release_type = package.release_type.ok_or_else(|| {
            Error::config(&path, repo, "release_type is required for every package")
        })?;
        let release_as = package
            .release_as
            .as_deref()
            .map(str::parse::<Version>)
            .transpose()
            .map_err(|e| Error::config(&path, repo, format!("invalid release_as: {e}")))?;

        let component = package
            .component
            .clone()
            .or_else(|| package.package_name.clone())
            .filter(|c| !c.is_empty());

        Ok(ComponentConfig {
            release_type,
            package_name: package.package_name.clone(),
            include_component_in_tag: package.include_component_in_tag.unwrap_or(true),
            include_v_in_tag: package.include_v_in_tag.unwrap_or(true),
            tag_separator: package
                .tag_separator
                .clone()
                .unwrap_or_else(|| DEFAULT_TAG_SEPARATOR.to_string()),
            separate_pull_requests: package
                .separate_pull_requests
                .unwrap_or(self.separate_pull_requests),
            draft: package.draft.unwrap_or(self.draft),
            prerelease: package.prerelease.or(self.prerelease),
            skip_github_release: package.skip_github_release.unwrap_or(false),
            skip_changelog: package.skip_changelog.unwrap_or(false),
            changelog_path: package
                .changelog_path
                .clone()
                .unwrap_or_else(|| "CHANGELOG.md".to_string()),
            versioning: package.versioning.unwrap_or_default(),
            extra_files: package.extra_files.clone().unwrap_or_default(),
            exclude_paths: package
                .exclude_paths
                .iter()
                .flatten()
                .map(|p| normalize_path(p))
                .collect(),
            release_as,
            pull_request_title_pattern: package
                .pull_request_title_pattern
                .clone()
                .or_else(|| self.pull_request_title_pattern.clone()),
            component,
            path,
        })
    }
}

fn path_contains(path: &str, file: &str) -> bool {
    path == ROOT_PROJECT_PATH || file.starts_with(&format!("{}/", path.trim_end_matches('/')))
}

/// Strip `./` prefixes and trailing slashes; empty becomes the root path
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() || trimmed == ROOT_PROJECT_PATH {
        ROOT_PROJECT_PATH.to_string()
    } else {
        trimmed.to_string()
    }
}
