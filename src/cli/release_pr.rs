//! release-pr command - open or update release pull requests

use crate::cli::CliProgress;
use crate::cli::context::{CommandContext, GlobalOptions};
use crate::cli::style::{CHECK, Stylize, arrow, check, link, spinner_style};
use anstream::println;
use indicatif::ProgressBar;
use release_manifest::error::Result;
use release_manifest::manifest::Manifest;
use release_manifest::release_pr::{PullRequestAction, PullRequestOutcome};
use std::time::Duration;

/// Run the release-pr command
pub async fn run_release_pr(options: &GlobalOptions, dry_run: bool) -> Result<()> {
    let ctx = CommandContext::new(options).await?;
    println!("{} {}", "Release pull requests for".emphasis(), ctx.describe());

    let manifest = Manifest::new(&ctx.platform, ctx.config.clone())?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message("Reading history from GitHub...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    let planned = manifest.build_pull_requests().await;
    spinner.finish_and_clear();
    let planned = planned?;

    if planned.is_empty() {
        println!("{}", "Nothing to release".muted());
        return Ok(());
    }
    println!("{} Planned {} pull request(s)", check(), planned.len().accent());
    for pr in &planned {
        println!("  {} {} ({})", arrow(), pr.title.to_string().emphasis(), pr.head_branch.muted());
        for release in &pr.releases {
            let previous = release
                .previous
                .as_ref()
                .map_or_else(|| "unreleased".to_string(), ToString::to_string);
            println!(
                "      {} {} → {}",
                release.component.as_deref().unwrap_or(&release.path),
                previous.muted(),
                release.version.accent()
            );
        }
    }

    let progress = CliProgress::compact();
    let outcomes = manifest
        .execute_pull_requests(planned, dry_run, &progress)
        .await?;
    print_summary(&outcomes, dry_run);
    Ok(())
}

fn print_summary(outcomes: &[PullRequestOutcome], dry_run: bool) {
    println!();
    if dry_run {
        println!("{}", "Dry run complete, nothing was pushed".muted());
        return;
    }
    let count = |wanted: fn(&PullRequestAction) -> bool| {
        outcomes.iter().filter(|o| wanted(&o.action)).count()
    };
    println!(
        "{} {} created, {} updated, {} unchanged",
        format!("{CHECK} Done:").success(),
        count(|a| matches!(a, PullRequestAction::Created | PullRequestAction::Reopened)).accent(),
        count(|a| matches!(a, PullRequestAction::Updated)).accent(),
        count(|a| matches!(a, PullRequestAction::Unchanged | PullRequestAction::Skipped(_))).accent()
    );
    for outcome in outcomes {
        if let (Some(number), Some(url)) = (outcome.number, &outcome.url) {
            println!("  {} {}", arrow(), link(&format!("#{number} {}", outcome.title), url));
        }
    }
}
