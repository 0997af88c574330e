//! Release execution - effectful operations
//!
//! Releases of one merged pull request are created strictly one after
//! another inside a branch lock. Each success is followed right away by its
//! label and comment bookkeeping, so a failure part way through leaves the
//! earlier releases fully recorded.

use super::plan::{CandidateRelease, MergedReleasePullRequest};
use crate::config::ManifestConfig;
use crate::error::{Error, Result};
use crate::history::History;
use crate::labels::{ReleaseEvent, ReleasePhase};
use crate::platform::retry::RetryPolicy;
use crate::progress::ProgressCallback;
use crate::types::GitHubRelease;
use futures::future::join_all;
use tracing::{debug, info, warn};

/// Create the releases of every merged pull request (EFFECTFUL)
///
/// Returns the releases that were created. A pull request whose releases
/// all already exist fails with [`Error::DuplicateRelease`].
pub async fn execute_releases(
    history: History<'_>,
    config: &ManifestConfig,
    merged: &[MergedReleasePullRequest],
    poll: &RetryPolicy,
    progress: &dyn ProgressCallback,
) -> Result<Vec<GitHubRelease>> {
    let mut created = Vec::new();
    for pr in merged.iter().filter(|pr| !pr.releases.is_empty()) {
        progress
            .on_message(&format!(
                "🏷️  Tagging {} release(s) from PR #{}",
                pr.releases.len(),
                pr.pull_request.number
            ))
            .await;
        created.extend(release_pull_request(history, config, pr, poll, progress).await?);
    }
    Ok(created)
}

async fn release_pull_request(
    history: History<'_>,
    config: &ManifestConfig,
    pr: &MergedReleasePullRequest,
    poll: &RetryPolicy,
    progress: &dyn ProgressCallback,
) -> Result<Vec<GitHubRelease>> {
    let target = &config.target_branch;
    let locked = match history.lock_branch(target).await {
        Ok(()) => true,
        Err(e) if e.is_permission_error() => {
            warn!(branch = %target, error = %e, "cannot lock branch, continuing unlocked");
            false
        }
        Err(e) => return Err(e),
    };

    let result = create_releases(history, config, pr, poll, progress).await;

    if result.is_ok()
        && let Some(changes) = config.changes_branch.as_deref().filter(|c| *c != target.as_str())
    {
        best_effort(
            "realign changes branch",
            realign_changes_branch(history, changes, &pr.pull_request.head_branch_name, target)
                .await,
        );
    }
    if locked {
        best_effort("unlock branch", history.unlock_branch(target).await);
    }
    result
}

async fn create_releases(
    history: History<'_>,
    config: &ManifestConfig,
    pr: &MergedReleasePullRequest,
    poll: &RetryPolicy,
    progress: &dyn ProgressCallback,
) -> Result<Vec<GitHubRelease>> {
    let platform = history.platform();
    let number = pr.pull_request.number;
    let mut labels = pr.pull_request.labels.clone();
    let mut created = Vec::new();
    let mut duplicates = Vec::new();

    for release in &pr.releases {
        match platform.create_release(&release.request()).await {
            Ok(github_release) => {
                info!(tag = %release.tag, pr_number = number, "created release");
                progress
                    .on_message(&format!("✅ Released {}", release.tag))
                    .await;
                wait_until_visible(history, &release.tag, poll).await;
                record_release(history, config, number, &mut labels, release, &github_release)
                    .await?;
                created.push(github_release);
            }
            Err(e @ Error::DuplicateRelease { .. }) => {
                warn!(tag = %release.tag, pr_number = number, "release already exists, skipping");
                duplicates.push(e);
            }
            Err(e) => return Err(e),
        }
    }

    if created.is_empty()
        && let Some(first) = duplicates.into_iter().next()
    {
        return Err(first);
    }
    Ok(created)
}

/// Move labels to tagged and link the release from the pull request
async fn record_release(
    history: History<'_>,
    config: &ManifestConfig,
    number: u64,
    labels: &mut Vec<String>,
    release: &CandidateRelease,
    created: &GitHubRelease,
) -> Result<()> {
    let platform = history.platform();
    let names = &config.labels;
    let event = ReleaseEvent::Released {
        prerelease: release.prerelease,
    };
    match ReleasePhase::from_labels(labels, names).transition(event, names) {
        Some((_, change)) => {
            let add: Vec<String> = change
                .add
                .into_iter()
                .filter(|l| !labels.contains(l))
                .collect();
            if !add.is_empty() {
                platform.add_labels(number, &add).await?;
            }
            remove_labels(history, number, &change.remove).await?;
            labels.retain(|l| !change.remove.contains(l));
            labels.extend(add);
        }
        None => debug!(pr_number = number, "labels need no transition"),
    }

    let url = if created.url.is_empty() {
        format!("tag {}", release.tag)
    } else {
        created.url.clone()
    };
    platform
        .create_comment(number, &format!(":robot: Release is at {url} :sunflower:"))
        .await
}

/// Remove labels concurrently; fails only when every removal failed
async fn remove_labels(history: History<'_>, number: u64, labels: &[String]) -> Result<()> {
    if labels.is_empty() {
        return Ok(());
    }
    let platform = history.platform();
    let results = join_all(labels.iter().map(|l| platform.remove_label(number, l))).await;
    let errors: Vec<Error> = results.into_iter().filter_map(Result::err).collect();
    if errors.len() == labels.len() {
        return Err(Error::Aggregate(errors));
    }
    for error in &errors {
        warn!(pr_number = number, error = %error, "failed to remove label");
    }
    Ok(())
}

/// Poll the read path until the release shows up; gives up with a warning
async fn wait_until_visible(history: History<'_>, tag: &str, poll: &RetryPolicy) {
    let platform = history.platform();
    for attempt in 0..poll.max_retries {
        match platform.release_by_tag(tag).await {
            Ok(Some(_)) => return,
            Ok(None) => debug!(tag, attempt, "release not visible yet"),
            Err(e) => debug!(tag, attempt, error = %e, "release lookup failed"),
        }
        if attempt + 1 < poll.max_retries {
            tokio::time::sleep(poll.delay(attempt + 1)).await;
        }
    }
    warn!(tag, "release still not visible, continuing");
}

/// Fast-forward the changes branch once the release pull request landed.
///
/// Only done when the changes branch holds nothing the merged head branch
/// did not; if the head branch is gone there is nothing to compare against.
async fn realign_changes_branch(
    history: History<'_>,
    changes: &str,
    head: &str,
    target: &str,
) -> Result<()> {
    let platform = history.platform();
    if platform.branch_sha(changes).await?.is_none() {
        debug!(branch = changes, "no changes branch to realign");
        return Ok(());
    }
    if platform.branch_sha(head).await?.is_some() {
        if history.compare_branches(changes, head).await? {
            history.align_branch(changes, target).await?;
        } else {
            info!(branch = changes, "changes branch has new commits, leaving it alone");
        }
    } else {
        let in_sync = history.compare_branches(changes, target).await?;
        debug!(branch = changes, in_sync, "head branch gone, skipping realignment");
    }
    Ok(())
}

/// Log and drop the error of a step that must not fail the run
fn best_effort(step: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(step, error = %e, "best-effort step failed");
    }
}
