//! GitHub token discovery

use super::AuthSource;
use crate::error::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Environment variables checked for a token, in order
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// A resolved GitHub token
#[derive(Debug, Clone)]
pub struct GitHubAuthConfig {
    /// The token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
}

/// Find a token: explicit value, then environment, then `gh auth token`
pub async fn get_github_auth(explicit: Option<&str>, host: Option<&str>) -> Result<GitHubAuthConfig> {
    if let Some(token) = explicit.filter(|t| !t.is_empty()) {
        debug!("using token from command line");
        return Ok(GitHubAuthConfig {
            token: token.to_string(),
            source: AuthSource::Explicit,
        });
    }

    for var in TOKEN_ENV_VARS {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            debug!(var, "using token from environment");
            return Ok(GitHubAuthConfig {
                token: token.trim().to_string(),
                source: AuthSource::EnvVar,
            });
        }
    }

    if let Some(token) = gh_cli_token(host).await {
        debug!("using token from gh CLI");
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::Cli,
        });
    }

    Err(Error::NoToken(format!(
        "set {} or run `gh auth login`",
        TOKEN_ENV_VARS.join(" or ")
    )))
}

async fn gh_cli_token(host: Option<&str>) -> Option<String> {
    let mut cmd = Command::new("gh");
    cmd.args(["auth", "token"]);
    if let Some(host) = host {
        cmd.args(["--hostname", host]);
    }
    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "gh CLI not available");
            return None;
        }
    };
    if !output.status.success() {
        debug!(status = %output.status, "gh auth token failed");
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}
