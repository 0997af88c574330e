//! Manifest orchestrator
//!
//! [`Manifest`] ties the pieces together for one run: it gathers history
//! through [`History`], resolves versions, runs plugins and hands the results
//! to the pure planners and the effectful executors.

use crate::config::{ComponentConfig, ManifestConfig, PluginConfig};
use crate::error::{Error, Result};
use crate::history::{CommitQuery, History};
use crate::plugin::{Plugin, build_plugins};
use crate::platform::PlatformService;
use crate::platform::retry::RetryPolicy;
use crate::progress::ProgressCallback;
use crate::release::{
    MergedReleasePullRequest, execute_releases, is_pending_release, plan_releases,
};
use crate::release_pr::body::PullRequestBody;
use crate::release_pr::{
    PlanContext, PullRequestOutcome, ReleasePullRequest, build_candidate,
    execute_release_pull_requests, plan_pull_requests,
};
use crate::resolver::{VersionResolver, find_release_markers};
use crate::types::{GitHubRelease, PullRequestStatus};
use crate::version::Version;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How many merged pull requests are scanned for pending releases
const MERGED_SEARCH_DEPTH: usize = 100;

/// One configured repository, ready to plan and execute
pub struct Manifest<'a> {
    platform: &'a dyn PlatformService,
    config: ManifestConfig,
    components: Vec<ComponentConfig>,
    plugins: Vec<Box<dyn Plugin>>,
    date: NaiveDate,
    poll: RetryPolicy,
}

impl<'a> Manifest<'a> {
    /// Resolve the configuration for `platform`'s repository.
    ///
    /// Fails with a configuration error before any remote call is made.
    pub fn new(platform: &'a dyn PlatformService, config: ManifestConfig) -> Result<Self> {
        let repo = platform.config().full_name();
        let components = config.components(&repo)?;
        let plugins = build_plugins(&config.plugins);
        Ok(Self {
            platform,
            config,
            components,
            plugins,
            date: Utc::now().date_naive(),
            poll: RetryPolicy::default(),
        })
    }

    /// Date written into release notes
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Append a plugin after the configured ones
    #[must_use]
    pub fn with_plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Delays used while waiting for a new release to become visible
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Configured components, in path order
    pub fn components(&self) -> &[ComponentConfig] {
        &self.components
    }

    /// The loaded configuration
    pub const fn config(&self) -> &ManifestConfig {
        &self.config
    }

    fn history(&self) -> History<'a> {
        History::new(self.platform)
    }

    fn plan_context(&self) -> PlanContext<'_> {
        self.plan_context_for(&self.components)
    }

    fn plan_context_for<'c>(&'c self, components: &'c [ComponentConfig]) -> PlanContext<'c> {
        PlanContext {
            config: &self.config,
            components,
            repo_url: self.platform.config().web_url(),
            date: self.date,
        }
    }

    /// Compute the release pull requests this run would open or update
    pub async fn build_pull_requests(&self) -> Result<Vec<ReleasePullRequest>> {
        let history = self.history();
        let target = &self.config.target_branch;

        if !self.pending_releases().await?.is_empty() {
            warn!(
                branch = %target,
                "merged release pull requests are still awaiting tags, not opening new ones"
            );
            return Ok(Vec::new());
        }

        let ctx = self.plan_context();
        let source = ctx.source_branch();
        info!(branch = source, "reading commit history");
        let window = history
            .commits(
                source,
                CommitQuery {
                    max_results: Some(self.config.commit_search_depth),
                    backfill_files: true,
                },
            )
            .collect_all()
            .await?;
        debug!(count = window.len(), "collected commits");

        let baseline = self.load_baseline(source).await?;
        let markers = find_release_markers(&window, target, &ctx.marker_patterns());
        debug!(count = markers.len(), "found release markers");

        let resolutions = VersionResolver::new(history, self.config.release_search_depth)
            .resolve(&self.components, &self.marker_aliases(), &window, &baseline, &markers)
            .await?;

        let mut components = self.components.clone();
        for plugin in &self.plugins {
            plugin.preconfigure(&mut components, &resolutions);
        }
        let ctx = self.plan_context_for(&components);

        let paths: Vec<&str> = components.iter().map(|c| c.path.as_str()).collect();
        let mut candidates = Vec::with_capacity(components.len());
        for component in &components {
            let resolution = resolutions.get(&component.path).ok_or_else(|| {
                Error::Internal(format!("component {} was not resolved", component.path))
            })?;
            candidates.push(build_candidate(
                component,
                &paths,
                resolution,
                &window,
                &markers,
                &self.plugins,
            ));
        }
        for plugin in &self.plugins {
            candidates = plugin.run(candidates);
        }

        let pull_requests = plan_pull_requests(&ctx, candidates)?;
        info!(count = pull_requests.len(), "planned release pull requests");
        Ok(pull_requests)
    }

    /// Open or update every release pull request
    pub async fn create_pull_requests(
        &self,
        dry_run: bool,
        progress: &dyn ProgressCallback,
    ) -> Result<Vec<PullRequestOutcome>> {
        let pull_requests = self.build_pull_requests().await?;
        self.execute_pull_requests(pull_requests, dry_run, progress).await
    }

    /// Push already planned release pull requests
    pub async fn execute_pull_requests(
        &self,
        pull_requests: Vec<ReleasePullRequest>,
        dry_run: bool,
        progress: &dyn ProgressCallback,
    ) -> Result<Vec<PullRequestOutcome>> {
        execute_release_pull_requests(
            &self.plan_context(),
            self.history(),
            pull_requests,
            dry_run,
            progress,
        )
        .await
    }

    /// Releases promised by merged release pull requests, oldest first
    pub async fn build_releases(&self) -> Result<Vec<MergedReleasePullRequest>> {
        let mut planned = Vec::new();
        for pr in self.pending_releases().await?.into_iter().rev() {
            let Some(body) = PullRequestBody::resolve(self.platform, &pr).await? else {
                warn!(pr_number = pr.number, "could not parse release pull request body");
                continue;
            };
            planned.push(plan_releases(&self.config, &self.components, &pr, &body));
        }
        Ok(planned)
    }

    /// Create releases for every merged release pull request
    pub async fn create_releases(
        &self,
        progress: &dyn ProgressCallback,
    ) -> Result<Vec<GitHubRelease>> {
        let merged = self.build_releases().await?;
        execute_releases(self.history(), &self.config, &merged, &self.poll, progress).await
    }

    async fn pending_releases(&self) -> Result<Vec<crate::types::PullRequest>> {
        let target = &self.config.target_branch;
        let mut merged = self.history().pull_requests(
            target,
            PullRequestStatus::Merged,
            Some(MERGED_SEARCH_DEPTH),
            true,
        );
        let mut pending = Vec::new();
        while let Some(pr) = merged.next().await? {
            if is_pending_release(&pr, target, &self.config.labels) {
                pending.push(pr);
            }
        }
        Ok(pending)
    }

    /// Read the manifest baseline; a missing file is an empty baseline
    async fn load_baseline(&self, branch: &str) -> Result<BTreeMap<String, Version>> {
        let path = &self.config.manifest_path;
        let content = match self.platform.file_contents(path, branch).await {
            Ok(content) => content,
            Err(Error::FileNotFound { .. }) => {
                debug!(path, "no manifest baseline");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e),
        };
        let repo = self.platform.config().full_name();
        let raw: BTreeMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| Error::config(path, &repo, format!("invalid manifest baseline: {e}")))?;
        raw.into_iter()
            .map(|(component_path, version)| {
                let version: Version = version.parse().map_err(|e| {
                    Error::config(path, &repo, format!("invalid version for {component_path}: {e}"))
                })?;
                Ok((crate::config::normalize_path(&component_path), version))
            })
            .collect()
    }

    /// Names a release marker may carry for each component
    fn marker_aliases(&self) -> BTreeMap<String, Vec<String>> {
        self.components
            .iter()
            .map(|component| {
                let mut aliases = vec![component.path.clone()];
                if let Some(name) = &component.component {
                    aliases.push(name.clone());
                    for plugin in &self.config.plugins {
                        if let PluginConfig::LinkedVersions {
                            group_name,
                            components,
                        } = plugin
                            && components.contains(name)
                        {
                            aliases.push(group_name.clone());
                        }
                    }
                }
                (component.path.clone(), aliases)
            })
            .collect()
    }
}
