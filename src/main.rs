//! relman - manifest-driven releases for GitHub repositories

mod cli;

use clap::{Parser, Subcommand};
use cli::context::GlobalOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relman")]
#[command(about = "Release pull requests and GitHub releases from a release manifest")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Repository as owner/name (defaults to GITHUB_REPOSITORY)
    #[arg(long, global = true, value_name = "OWNER/NAME")]
    repo: Option<String>,

    /// GitHub API base URL (for GitHub Enterprise)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// GitHub token (defaults to GITHUB_TOKEN, GH_TOKEN or `gh auth token`)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Compute and report without changing anything on GitHub
    #[arg(long, global = true)]
    dry_run: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open or update release pull requests
    ReleasePr,
    /// Create GitHub releases for merged release pull requests
    GithubRelease,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "release_manifest=debug,relman=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = GlobalOptions {
        config: cli.config,
        repo: cli.repo,
        api_url: cli.api_url,
        token: cli.token,
    };

    match cli.command {
        Commands::ReleasePr => cli::release_pr::run_release_pr(&options, cli.dry_run).await?,
        Commands::GithubRelease => {
            cli::github_release::run_github_release(&options, cli.dry_run).await?;
        }
    }

    Ok(())
}
