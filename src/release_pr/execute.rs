//! Release pull request execution - effectful operations
//!
//! Takes the [`ReleasePullRequest`]s produced by planning and reconciles each
//! with what exists on the platform: an open pull request on the same head
//! branch is updated, a snoozed one is reopened only when its content changed,
//! otherwise a new pull request is opened.

use super::body::PullRequestBody;
use super::plan::{PlanContext, with_custom_version};
use super::title::PullRequestTitle;
use super::ReleasePullRequest;
use crate::error::{Error, Result};
use crate::history::History;
use crate::labels::{ReleaseEvent, ReleasePhase};
use crate::progress::ProgressCallback;
use crate::types::{FileChange, PullRequest, PullRequestRequest, PullRequestStatus};
use futures::future::try_join_all;
use std::fmt;
use tracing::{debug, info, warn};

/// How many closed pull requests are searched for a snoozed one
const CLOSED_SEARCH_DEPTH: usize = 100;

/// What happened to one planned pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestAction {
    /// A new pull request was opened
    Created,
    /// An open pull request was refreshed
    Updated,
    /// A snoozed pull request was reopened with new content
    Reopened,
    /// The open pull request already matched
    Unchanged,
    /// Nothing was done, with the reason
    Skipped(String),
    /// Dry run; nothing was written
    DryRun,
}

impl fmt::Display for PullRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Reopened => write!(f, "reopened"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::DryRun => write!(f, "would open or update"),
        }
    }
}

/// Result for one planned pull request
#[derive(Debug, Clone)]
pub struct PullRequestOutcome {
    /// What was done
    pub action: PullRequestAction,
    /// Final title
    pub title: String,
    /// Head branch
    pub head_branch: String,
    /// Pull request number, once one exists
    pub number: Option<u64>,
    /// Web URL, once one exists
    pub url: Option<String>,
}

impl PullRequestOutcome {
    fn new(pr: &ReleasePullRequest, action: PullRequestAction, remote: Option<&PullRequest>) -> Self {
        Self {
            action,
            title: pr.title.to_string(),
            head_branch: pr.head_branch.to_string(),
            number: remote.map(|r| r.number),
            url: remote.map(|r| r.html_url.clone()),
        }
    }
}

/// Push every planned pull request (EFFECTFUL)
///
/// Pull requests are handled one after another; the first failure stops the
/// run and is returned.
pub async fn execute_release_pull_requests(
    ctx: &PlanContext<'_>,
    history: History<'_>,
    pull_requests: Vec<ReleasePullRequest>,
    dry_run: bool,
    progress: &dyn ProgressCallback,
) -> Result<Vec<PullRequestOutcome>> {
    let mut outcomes = Vec::with_capacity(pull_requests.len());
    for pr in pull_requests {
        progress
            .on_message(&format!("📝 Preparing {} ({})", pr.title, pr.head_branch))
            .await;
        let outcome = execute_one(ctx, history, pr, dry_run).await?;
        let number = outcome.number.map(|n| format!(" #{n}")).unwrap_or_default();
        progress
            .on_message(&format!("✅ {}{number}: {}", outcome.action, outcome.title))
            .await;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

async fn execute_one(
    ctx: &PlanContext<'_>,
    history: History<'_>,
    mut pr: ReleasePullRequest,
    dry_run: bool,
) -> Result<PullRequestOutcome> {
    let platform = history.platform();
    let head = pr.head_branch.to_string();
    let labels = &ctx.config.labels;

    let mut existing = history.find_open_pull_request(&pr.target_branch, &head).await?;
    let mut comments = Vec::new();
    let mut reopened = false;

    if let Some(open) = &existing {
        let (reconciled, comment) = reconcile_version(ctx, pr, open)?;
        pr = reconciled;
        comments.extend(comment);
        let current_body = PullRequestBody::resolve(platform, open).await?;
        if comments.is_empty()
            && open.title == pr.title.to_string()
            && current_body.as_ref() == Some(&pr.body)
        {
            debug!(number = open.number, "open pull request already up to date");
            return Ok(PullRequestOutcome::new(&pr, PullRequestAction::Unchanged, Some(open)));
        }
    } else if let Some(snoozed) = find_snoozed(history, &labels.snooze, &pr, &head).await? {
        let previous_body = PullRequestBody::resolve(platform, &snoozed).await?;
        if previous_body.as_ref() == Some(&pr.body) {
            info!(number = snoozed.number, "snoozed pull request has no new changes");
            return Ok(PullRequestOutcome::new(
                &pr,
                PullRequestAction::Skipped("snoozed".to_string()),
                Some(&snoozed),
            ));
        }
        if !dry_run {
            info!(number = snoozed.number, "reopening snoozed pull request");
            platform.reopen_pull_request(snoozed.number).await?;
            if let Some((_, change)) = ReleasePhase::from_labels(&snoozed.labels, labels)
                .transition(ReleaseEvent::Reopened, labels)
            {
                platform.add_labels(snoozed.number, &change.add).await?;
                for label in &change.remove {
                    platform.remove_label(snoozed.number, label).await?;
                }
            }
        }
        reopened = true;
        existing = Some(snoozed);
    }

    if dry_run {
        info!(title = %pr.title, head, "dry run, not pushing");
        return Ok(PullRequestOutcome::new(&pr, PullRequestAction::DryRun, existing.as_ref()));
    }

    let source = ctx.source_branch();
    let source_sha = platform
        .branch_sha(source)
        .await?
        .ok_or_else(|| Error::Internal(format!("source branch {source} not found")))?;
    history.fork_or_reset_branch(&head, &source_sha).await?;

    let rendered = pr.body.render_for_platform();
    let mut files = build_file_changes(history, &pr, source).await?;
    files.extend(rendered.companion);
    if !files.is_empty() {
        let message = pr.title.to_string();
        platform.push_files(&head, &source_sha, &message, &files).await?;
    }

    let title = pr.title.to_string();
    let (remote, action) = match existing {
        Some(open) => {
            let updated = platform
                .update_pull_request(open.number, &title, &rendered.inline)
                .await?;
            let action = if reopened {
                PullRequestAction::Reopened
            } else {
                PullRequestAction::Updated
            };
            (updated, action)
        }
        None => {
            let created = platform
                .create_pull_request(&PullRequestRequest {
                    head: head.clone(),
                    base: pr.target_branch.clone(),
                    title: title.clone(),
                    body: rendered.inline.clone(),
                    draft: pr.draft,
                })
                .await?;
            platform.add_labels(created.number, &pr.labels).await?;
            (created, PullRequestAction::Created)
        }
    };

    for comment in &comments {
        platform.create_comment(remote.number, comment).await?;
    }

    match &ctx.config.auto_merge {
        Some(filter) if filter.matches(&pr) => {
            info!(number = remote.number, method = %filter.merge_method, "enabling auto-merge");
            platform
                .enable_auto_merge(remote.number, &filter.merge_method)
                .await?;
        }
        _ if !ctx.config.reviewers.is_empty() => {
            platform
                .request_reviewers(remote.number, &ctx.config.reviewers)
                .await?;
        }
        _ => {}
    }

    Ok(PullRequestOutcome::new(&pr, action, Some(&remote)))
}

/// Pick the version for a pull request that is already open.
///
/// With the custom-version label the version in the open title wins. Without
/// it the computed version wins, but a differing title still gets a comment.
fn reconcile_version(
    ctx: &PlanContext<'_>,
    pr: ReleasePullRequest,
    open: &PullRequest,
) -> Result<(ReleasePullRequest, Option<String>)> {
    let computed = pr.title.version.clone();
    let parsed = PullRequestTitle::parse(&open.title, pr.title.pattern()).and_then(|t| t.version);

    if ctx.config.labels.has_custom_version(&open.labels) {
        return match parsed {
            Some(version) if Some(&version) != computed.as_ref() => {
                info!(number = open.number, version = %version, "using custom version from title");
                Ok((with_custom_version(ctx, &pr, &version)?, None))
            }
            Some(_) => Ok((pr, None)),
            None => {
                warn!(number = open.number, title = %open.title, "custom version label but no parsable version");
                let comment = format!(
                    "This pull request carries the `{}` label, but no version could be read from \
                     its title `{}`. The computed version is used instead.",
                    ctx.config.labels.custom_version, open.title
                );
                Ok((pr, Some(comment)))
            }
        };
    }

    match (parsed, &computed) {
        (Some(version), Some(computed)) if &version != computed => {
            warn!(number = open.number, title_version = %version, computed = %computed, "title version differs from computed version");
            let comment = format!(
                "The title of this pull request named version {version}, but the computed version \
                 is {computed}. To keep a different version, edit the title and add the `{}` label.",
                ctx.config.labels.custom_version
            );
            Ok((pr, Some(comment)))
        }
        _ => Ok((pr, None)),
    }
}

async fn find_snoozed(
    history: History<'_>,
    snooze: &str,
    pr: &ReleasePullRequest,
    head: &str,
) -> Result<Option<PullRequest>> {
    let mut closed = history.pull_requests(
        &pr.target_branch,
        PullRequestStatus::Closed,
        Some(CLOSED_SEARCH_DEPTH),
        false,
    );
    while let Some(candidate) = closed.next().await? {
        if candidate.head_branch_name == head && candidate.labels.iter().any(|l| l == snooze) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Read, transform and collect every file update of `pr`.
///
/// Files missing on `source` are skipped unless the update may create them;
/// updates that leave a file unchanged are dropped.
async fn build_file_changes(
    history: History<'_>,
    pr: &ReleasePullRequest,
    source: &str,
) -> Result<Vec<FileChange>> {
    let platform = history.platform();
    let reads = try_join_all(pr.updates.iter().map(|update| async move {
        match platform.file_contents(&update.path, source).await {
            Ok(content) => Ok(Some(content)),
            Err(Error::FileNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }))
    .await?;

    let mut changes: Vec<FileChange> = Vec::new();
    for (update, existing) in pr.updates.iter().zip(reads) {
        if existing.is_none() && !update.create_if_missing {
            debug!(path = %update.path, "file missing, skipping update");
            continue;
        }
        // Several components may update the same file (e.g. the manifest)
        let current = changes
            .iter()
            .find(|c| c.path == update.path)
            .map(|c| c.content.clone())
            .or(existing.clone());
        let content = update.updater.apply(&update.path, current.as_deref())?;
        if existing.as_deref() == Some(content.as_str()) {
            continue;
        }
        match changes.iter_mut().find(|c| c.path == update.path) {
            Some(change) => change.content = content,
            None => changes.push(FileChange {
                path: update.path.clone(),
                content,
            }),
        }
    }
    Ok(changes)
}
