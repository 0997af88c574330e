//! Shared command context for CLI commands
//!
//! Extracts common setup code shared by the release-pr and github-release
//! commands: loading configuration, resolving the repository and token, and
//! creating the platform service.

use crate::cli::style::Stylize;
use release_manifest::auth::{AuthSource, get_github_auth};
use release_manifest::config::{DEFAULT_CONFIG_FILE, ManifestConfig};
use release_manifest::error::{Error, Result};
use release_manifest::platform::{GitHubService, PlatformService};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Configuration file; defaults to `release-manifest.toml`
    pub config: Option<PathBuf>,
    /// `owner/name`; falls back to `GITHUB_REPOSITORY`
    pub repo: Option<String>,
    /// API base URL for GitHub Enterprise or testing
    pub api_url: Option<String>,
    /// Explicit token
    pub token: Option<String>,
}

/// Shared context for CLI commands that interact with GitHub
pub struct CommandContext {
    /// Loaded configuration
    pub config: ManifestConfig,
    /// Platform service
    pub platform: GitHubService,
    /// Where the token came from
    pub auth_source: AuthSource,
}

impl CommandContext {
    /// Load configuration and connect to GitHub
    pub async fn new(options: &GlobalOptions) -> Result<Self> {
        let config_path = options
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config = load_config(&config_path)?;

        let repo = options
            .repo
            .clone()
            .or_else(|| std::env::var("GITHUB_REPOSITORY").ok())
            .ok_or_else(|| {
                Error::config("relman", "-", "no repository given; pass --repo owner/name")
            })?;
        let (owner, name) = parse_repo(&repo)?;

        let host = match &options.api_url {
            Some(api_url) => Some(api_host(api_url)?),
            None => None,
        };
        let auth = get_github_auth(options.token.as_deref(), host.as_deref()).await?;
        debug!(source = %auth.source, "authenticated");

        let platform = match &options.api_url {
            Some(api_url) => GitHubService::with_api_url(&auth.token, owner, name, api_url)?,
            None => GitHubService::new(&auth.token, owner, name, None)?,
        }
        .with_history_source(config.history_source);

        Ok(Self {
            config,
            platform,
            auth_source: auth.source,
        })
    }

    /// One-line description of the connection, for headers
    pub fn describe(&self) -> String {
        format!(
            "{} (token from {})",
            self.platform.config().full_name().accent(),
            self.auth_source
        )
    }
}

fn load_config(path: &Path) -> Result<ManifestConfig> {
    if !path.exists() {
        return Err(Error::config(
            path.display().to_string(),
            "-",
            "configuration file not found",
        ));
    }
    ManifestConfig::load(path)
}

/// Split `owner/name`
pub fn parse_repo(repo: &str) -> Result<(String, String)> {
    match repo.trim().split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((owner.to_string(), name.trim_end_matches(".git").to_string()))
        }
        _ => Err(Error::config(
            "relman",
            repo,
            "repository must be given as owner/name",
        )),
    }
}

fn api_host(api_url: &str) -> Result<String> {
    let url = url::Url::parse(api_url)
        .map_err(|e| Error::config("relman", "-", format!("invalid API URL {api_url}: {e}")))?;
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| Error::config("relman", "-", format!("API URL {api_url} has no host")))
}
