//! github-release command - tag merged release pull requests

use crate::cli::CliProgress;
use crate::cli::context::{CommandContext, GlobalOptions};
use crate::cli::style::{CHECK, Stylize, arrow, link};
use anstream::println;
use release_manifest::error::Result;
use release_manifest::manifest::Manifest;

/// Run the github-release command
pub async fn run_github_release(options: &GlobalOptions, dry_run: bool) -> Result<()> {
    let ctx = CommandContext::new(options).await?;
    println!("{} {}", "GitHub releases for".emphasis(), ctx.describe());

    let manifest = Manifest::new(&ctx.platform, ctx.config.clone())?;

    if dry_run {
        let merged = manifest.build_releases().await?;
        if merged.iter().all(|pr| pr.releases.is_empty()) {
            println!("{}", "No merged release pull requests awaiting tags".muted());
            return Ok(());
        }
        for pr in &merged {
            println!(
                "{} #{} {}",
                "Would release from".emphasis(),
                pr.pull_request.number.accent(),
                pr.pull_request.title
            );
            for release in &pr.releases {
                let mut flags = Vec::new();
                if release.draft {
                    flags.push("draft");
                }
                if release.prerelease {
                    flags.push("prerelease");
                }
                println!(
                    "  {} {} at {} {}",
                    arrow(),
                    release.tag.accent(),
                    release.sha.get(..7).unwrap_or(&release.sha).muted(),
                    flags.join(", ").muted()
                );
            }
        }
        println!();
        println!("{}", "Dry run complete, nothing was tagged".muted());
        return Ok(());
    }

    let progress = CliProgress::compact();
    let created = manifest.create_releases(&progress).await?;
    println!();
    if created.is_empty() {
        println!("{}", "No merged release pull requests awaiting tags".muted());
        return Ok(());
    }
    println!(
        "{} {} release(s) created",
        format!("{CHECK} Done:").success(),
        created.len().accent()
    );
    for release in &created {
        println!("  {} {}", arrow(), link(&release.tag_name, &release.url));
    }
    Ok(())
}
