//! Manifest plugins
//!
//! Plugins adjust the run at three points, applied in configured order:
//! once released versions are known ([`Plugin::preconfigure`]), on each
//! component's parsed commits ([`Plugin::process_commits`]) and after every
//! candidate has been built, just before candidates are grouped into pull
//! requests ([`Plugin::run`]).

use crate::commit::ConventionalCommit;
use crate::config::{ComponentConfig, PluginConfig};
use crate::release_pr::{Candidate, PullRequestGroup};
use crate::resolver::Resolution;
use std::collections::BTreeMap;
use crate::version::Version;
use tracing::{debug, info};

/// A transformation over the components of one run
pub trait Plugin: Send + Sync {
    /// Adjust component configuration before commits are collected.
    ///
    /// `resolutions` maps each component path to its last release and the
    /// commit it landed on.
    fn preconfigure(
        &self,
        _components: &mut [ComponentConfig],
        _resolutions: &BTreeMap<String, Resolution>,
    ) {
    }

    /// Inject, drop or rewrite a component's commits before it is versioned
    fn process_commits(&self, commits: Vec<ConventionalCommit>) -> Vec<ConventionalCommit> {
        commits
    }

    /// Adjust candidates before they are grouped
    fn run(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
    }
}

/// Instantiate the configured plugins, in order
pub fn build_plugins(configs: &[PluginConfig]) -> Vec<Box<dyn Plugin>> {
    configs
        .iter()
        .map(|config| -> Box<dyn Plugin> {
            match config {
                PluginConfig::LinkedVersions {
                    group_name,
                    components,
                } => Box::new(LinkedVersions {
                    group_name: group_name.clone(),
                    components: components.clone(),
                }),
                PluginConfig::SentenceCase => Box::new(SentenceCase),
            }
        })
        .collect()
}

/// Releases a set of components together under one shared version
#[derive(Debug, Clone)]
pub struct LinkedVersions {
    /// Name of the shared pull request
    pub group_name: String,
    /// Linked component names
    pub components: Vec<String>,
}

impl LinkedVersions {
    fn is_member(&self, component: &ComponentConfig) -> bool {
        component
            .component
            .as_ref()
            .is_some_and(|name| self.components.contains(name))
    }
}

impl Plugin for LinkedVersions {
    fn preconfigure(
        &self,
        components: &mut [ComponentConfig],
        _resolutions: &BTreeMap<String, Resolution>,
    ) {
        for component in components.iter_mut().filter(|c| self.is_member(c)) {
            component.separate_pull_requests = false;
        }
    }

    fn run(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        let shared: Option<Version> = candidates
            .iter()
            .filter(|c| self.is_member(&c.config))
            .filter_map(|c| c.version.clone())
            .max();
        let Some(shared) = shared else {
            debug!(group = %self.group_name, "no linked component is releasing");
            return candidates;
        };
        info!(group = %self.group_name, version = %shared, "linking versions");

        for candidate in candidates.iter_mut().filter(|c| self.is_member(&c.config)) {
            let advances = candidate.current.as_ref().is_none_or(|current| &shared > current);
            if candidate.version.is_some() || advances {
                candidate.version = Some(shared.clone());
            }
            candidate.group = PullRequestGroup::Named(self.group_name.clone());
        }
        candidates
    }
}

/// Capitalizes the first letter of each commit subject in release notes
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceCase;

impl Plugin for SentenceCase {
    fn process_commits(&self, mut commits: Vec<ConventionalCommit>) -> Vec<ConventionalCommit> {
        for commit in &mut commits {
            commit.bare_message = capitalize(&commit.bare_message);
        }
        commits
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
